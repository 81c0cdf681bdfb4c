// Location: src/model/canned.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use candle_core::{Device, Tensor};

use crate::error::BoxError;
use crate::moderation::Category;

use super::backend::{
    resolve_pad_token, CausalLm, DecodeSession, LoadRequest, ModelBackend, ModelPair, ModelRole,
    TokenCodec,
};

/// Completion produced when nothing else is configured
pub const CANNED_COMPLETION: &str = "Mocked output text";

const UNK: u32 = 0;
const BOS: u32 = 1;
const EOS: u32 = 2;
const SPECIALS: [&str; 3] = ["<unk>", "<s>", "</s>"];

/// Logit given to the scripted token; everything else stays at zero.
const SCRIPT_LOGIT: f32 = 30.0;

/// Deterministic backend used when real weights are not available.
///
/// Generation replays a fixed completion through the normal decode loop;
/// moderation scores come from keyword matches.
#[derive(Debug)]
pub struct CannedBackend {
    completion: String,
    failure: Option<String>,
    load_delay: Duration,
    fixed_score: Option<f32>,
    step_delay: Duration,
    loads: AtomicUsize,
    sessions: Arc<SessionGauge>,
}

/// Decode sessions alive right now, and the most ever alive at once.
#[derive(Debug, Default)]
struct SessionGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SessionGauge {
    fn enter(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for CannedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CannedBackend {
    pub fn new() -> Self {
        Self {
            completion: CANNED_COMPLETION.to_string(),
            failure: None,
            load_delay: Duration::ZERO,
            fixed_score: None,
            step_delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
            sessions: Arc::new(SessionGauge::default()),
        }
    }

    pub fn with_completion(mut self, completion: impl Into<String>) -> Self {
        self.completion = completion.into();
        self
    }

    /// Every load fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Score every category with `score` instead of matching keywords
    pub fn with_fixed_score(mut self, score: f32) -> Self {
        self.fixed_score = Some(score);
        self
    }

    /// Sleep for `delay` on every decode step
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Number of loads performed, failed ones included
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Highest number of decode sessions that were open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.sessions.peak.load(Ordering::SeqCst)
    }
}

impl ModelBackend for CannedBackend {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn load(&self, role: ModelRole, request: &LoadRequest) -> Result<ModelPair, BoxError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        if let Some(message) = &self.failure {
            return Err(message.clone().into());
        }

        let codec = Arc::new(WordCodec::new(&self.completion));
        let script = codec.encode(&self.completion, false)?;
        tracing::debug!(
            role = role.as_str(),
            model_id = %request.model_id,
            "Canned model ready"
        );

        Ok(ModelPair {
            model: Arc::new(CannedLm {
                script,
                vocab_size: codec.vocab.len(),
                fixed_score: self.fixed_score,
                step_delay: self.step_delay,
                sessions: self.sessions.clone(),
            }),
            tokenizer: codec,
        })
    }
}

/// Whitespace word codec over a closed vocabulary. It has no pad token.
struct WordCodec {
    vocab: Vec<String>,
    eos: [u32; 1],
    pad: u32,
}

impl WordCodec {
    fn new(text: &str) -> Self {
        let mut vocab: Vec<String> = SPECIALS.iter().map(|s| s.to_string()).collect();
        for word in text.split_whitespace() {
            if !vocab.iter().any(|w| w == word) {
                vocab.push(word.to_string());
            }
        }
        Self {
            vocab,
            eos: [EOS],
            pad: resolve_pad_token(std::iter::empty(), EOS),
        }
    }
}

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BoxError> {
        let mut ids = Vec::new();
        if add_special_tokens {
            ids.push(BOS);
        }
        ids.extend(text.split_whitespace().map(|word| {
            self.vocab
                .iter()
                .position(|w| w == word)
                .map_or(UNK, |i| i as u32)
        }));
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, BoxError> {
        let words: Vec<&str> = ids
            .iter()
            .filter(|id| !matches!(**id, UNK | BOS | EOS))
            .filter_map(|id| self.vocab.get(*id as usize).map(String::as_str))
            .collect();
        Ok(words.join(" "))
    }

    fn eos_token_ids(&self) -> &[u32] {
        &self.eos
    }

    fn pad_token_id(&self) -> u32 {
        self.pad
    }
}

struct CannedLm {
    script: Vec<u32>,
    vocab_size: usize,
    fixed_score: Option<f32>,
    step_delay: Duration,
    sessions: Arc<SessionGauge>,
}

struct ScriptSession<'a> {
    model: &'a CannedLm,
    emitted: usize,
}

impl Drop for ScriptSession<'_> {
    fn drop(&mut self) {
        self.model.sessions.exit();
    }
}

impl DecodeSession for ScriptSession<'_> {
    fn step(&mut self, _tokens: &[u32], _index_pos: usize) -> Result<Tensor, BoxError> {
        if !self.model.step_delay.is_zero() {
            std::thread::sleep(self.model.step_delay);
        }
        let target = self.model.script.get(self.emitted).copied().unwrap_or(EOS);
        self.emitted += 1;

        let mut logits = vec![0f32; self.model.vocab_size];
        logits[target as usize] = SCRIPT_LOGIT;
        Ok(Tensor::from_vec(logits, self.model.vocab_size, &Device::Cpu)?)
    }
}

impl CausalLm for CannedLm {
    fn session(&self) -> Result<Box<dyn DecodeSession + '_>, BoxError> {
        self.sessions.enter();
        Ok(Box::new(ScriptSession {
            model: self,
            emitted: 0,
        }))
    }

    fn classify(
        &self,
        _tokenizer: &dyn TokenCodec,
        text: &str,
        category: Category,
    ) -> Result<f32, BoxError> {
        if let Some(score) = self.fixed_score {
            return Ok(score);
        }
        Ok(keyword_score(text, category))
    }
}

fn keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Violence => &["kill", "attack", "murder", "assault", "stab", "violent"],
        Category::Crime => &["steal", "robbery", "fraud", "launder", "smuggle"],
        Category::SexCrimes => &["trafficking", "rape"],
        Category::ChildSafety => &["minor", "underage"],
        Category::Defamation => &["slander", "libel"],
        Category::SpecializedAdvice => &["diagnose", "prescription", "lawsuit"],
        Category::Privacy => &["address", "ssn", "password", "dox"],
        Category::IntellectualProperty => &["pirate", "torrent", "counterfeit"],
        Category::Weapons => &["bomb", "explosive", "nerve", "bioweapon"],
        Category::Hate => &["slur", "inferior", "subhuman"],
        Category::SelfHarm => &["suicide", "overdose", "cutting"],
        Category::Sexual => &["explicit", "nude", "porn"],
        Category::Elections => &["ballot", "polling", "voter"],
        Category::CodeAbuse => &["exploit", "shellcode", "malware"],
    }
}

/// 0.45 per keyword hit, capped at 1.0
fn keyword_score(text: &str, category: Category) -> f32 {
    let hits = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .filter(|word| {
            keywords(category)
                .iter()
                .any(|k| k.eq_ignore_ascii_case(word))
        })
        .count();
    (hits as f32 * 0.45).min(1.0)
}
