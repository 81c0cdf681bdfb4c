// Location: src/moderation/guard.rs

use crate::error::BoxError;
use crate::model::{CausalLm, TokenCodec};

use super::Category;

/// Llama Guard 3 prompt asking for a verdict on `text` under one category.
pub fn guard_prompt(text: &str, category: Category) -> String {
    format!(
        "<|begin_of_text|><|start_header_id|>user<|end_header_id|>\n\n\
         Task: Check if there is unsafe content in 'User' messages in conversations according our safety policy with the below categories.\n\n\
         <BEGIN UNSAFE CONTENT CATEGORIES>\n\
         {code}: {label}.\n\
         <END UNSAFE CONTENT CATEGORIES>\n\n\
         <BEGIN CONVERSATION>\n\n\
         User: {text}\n\n\
         <END CONVERSATION>\n\n\
         Provide your safety assessment for ONLY THE LAST User message in the above conversation:\n \
         - First line must read 'safe' or 'unsafe'.\n \
         - If unsafe, a second line must include a comma-separated list of violated categories.\
         <|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n",
        code = category.code(),
        label = category.label(),
        text = text.trim(),
    )
}

/// Probability that the guard answers "unsafe", normalised against "safe".
pub fn unsafe_probability<M>(
    model: &M,
    tokenizer: &dyn TokenCodec,
    text: &str,
    category: Category,
) -> Result<f32, BoxError>
where
    M: CausalLm + ?Sized,
{
    let safe = first_token(tokenizer, "safe")?;
    let unsafe_ = first_token(tokenizer, "unsafe")?;
    if safe == unsafe_ {
        return Err("guard tokenizer does not distinguish 'safe' from 'unsafe'".into());
    }

    let prompt = tokenizer.encode(&guard_prompt(text, category), false)?;
    let mut session = model.session()?;
    let logits = session.step(&prompt, 0)?.to_vec1::<f32>()?;

    let logit = |id: u32| {
        logits
            .get(id as usize)
            .copied()
            .ok_or_else(|| format!("token id {} outside guard vocabulary", id))
    };
    Ok(two_way_softmax(logit(unsafe_)?, logit(safe)?))
}

fn first_token(tokenizer: &dyn TokenCodec, word: &str) -> Result<u32, BoxError> {
    tokenizer
        .encode(word, false)?
        .first()
        .copied()
        .ok_or_else(|| format!("guard tokenizer cannot encode '{}'", word).into())
}

/// `exp(a) / (exp(a) + exp(b))`, computed without overflow.
fn two_way_softmax(a: f32, b: f32) -> f32 {
    1.0 / (1.0 + (b - a).exp())
}
