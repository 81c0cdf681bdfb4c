// Location: src/model/tokenizer.rs

use std::path::Path;

use tokenizers::Tokenizer as HfTokenizer;

use crate::error::BoxError;

use super::backend::{resolve_pad_token, TokenCodec};

/// End-of-sequence spellings across Llama generations, most specific first
const EOS_TOKENS: &[&str] = &["<|eot_id|>", "<|end_of_text|>", "</s>", "<|endoftext|>"];

const PAD_TOKENS: &[&str] = &["<pad>", "<|pad|>", "[PAD]", "<|finetune_right_pad_id|>"];

/// `tokenizers` tokenizer with resolved special tokens
pub struct HfTokenCodec {
    tokenizer: HfTokenizer,
    eos_token_ids: Vec<u32>,
    pad_token_id: u32,
}

impl HfTokenCodec {
    /// Load `tokenizer.json`. `config_eos` comes from the model config and takes
    /// precedence over ids discovered in the vocabulary.
    pub fn from_file(path: impl AsRef<Path>, config_eos: Vec<u32>) -> Result<Self, BoxError> {
        let path = path.as_ref();
        let tokenizer = HfTokenizer::from_file(path)
            .map_err(|e| format!("failed to read tokenizer {}: {}", path.display(), e))?;
        Self::from_tokenizer(tokenizer, config_eos)
    }

    pub fn from_tokenizer(tokenizer: HfTokenizer, config_eos: Vec<u32>) -> Result<Self, BoxError> {
        let eos_token_ids = if config_eos.is_empty() {
            EOS_TOKENS
                .iter()
                .filter_map(|t| tokenizer.token_to_id(t))
                .collect()
        } else {
            config_eos
        };

        let eos = *eos_token_ids
            .first()
            .ok_or("tokenizer defines no end-of-sequence token")?;

        let padding = std::iter::once(tokenizer.get_padding().map(|p| p.pad_id));
        let named = PAD_TOKENS.iter().map(|t| tokenizer.token_to_id(t));
        let pad_token_id = resolve_pad_token(padding.chain(named), eos);
        if pad_token_id == eos {
            tracing::debug!(eos, "Tokenizer has no pad token, padding with end-of-sequence");
        }

        Ok(Self {
            tokenizer,
            eos_token_ids,
            pad_token_id,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

impl TokenCodec for HfTokenCodec {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, BoxError> {
        let encoding = self.tokenizer.encode(text, add_special_tokens)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, BoxError> {
        self.tokenizer.decode(ids, true)
    }

    fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }

    fn pad_token_id(&self) -> u32 {
        self.pad_token_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Minimal word-level `tokenizer.json`
    fn word_level_json(words: &[&str]) -> String {
        let vocab: serde_json::Map<String, serde_json::Value> = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.to_string(), serde_json::Value::from(i as u32)))
            .collect();
        serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "<unk>" }
        })
        .to_string()
    }

    fn word_tokenizer(words: &[&str]) -> HfTokenizer {
        HfTokenizer::from_str(&word_level_json(words)).unwrap()
    }

    #[test]
    fn test_pad_falls_back_to_eos() {
        let tokenizer = word_tokenizer(&["<unk>", "hello", "world", "<|eot_id|>"]);
        let codec = HfTokenCodec::from_tokenizer(tokenizer, Vec::new()).unwrap();

        assert_eq!(codec.eos_token_ids(), &[3]);
        assert_eq!(codec.pad_token_id(), 3);
    }

    #[test]
    fn test_named_pad_token() {
        let tokenizer = word_tokenizer(&["<unk>", "<pad>", "hello", "</s>"]);
        let codec = HfTokenCodec::from_tokenizer(tokenizer, Vec::new()).unwrap();

        assert_eq!(codec.eos_token_ids(), &[3]);
        assert_eq!(codec.pad_token_id(), 1);
    }

    #[test]
    fn test_config_eos_takes_precedence() {
        let tokenizer = word_tokenizer(&["<unk>", "hello", "</s>"]);
        let codec = HfTokenCodec::from_tokenizer(tokenizer, vec![1]).unwrap();
        assert_eq!(codec.eos_token_ids(), &[1]);
    }

    #[test]
    fn test_missing_eos_is_an_error() {
        let tokenizer = word_tokenizer(&["<unk>", "hello"]);
        assert!(HfTokenCodec::from_tokenizer(tokenizer, Vec::new()).is_err());
    }

    #[test]
    fn test_from_file_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, word_level_json(&["<unk>", "hello", "world", "</s>"])).unwrap();

        let codec = HfTokenCodec::from_file(&path, Vec::new()).unwrap();
        assert_eq!(codec.encode("hello world", false).unwrap(), vec![1, 2]);
        assert_eq!(codec.encode("goodbye", false).unwrap(), vec![0]);
        assert_eq!(codec.vocab_size(), 4);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(HfTokenCodec::from_file("/nonexistent/tokenizer.json", Vec::new()).is_err());
    }
}
