//! Runs a few prompts through the pipeline and prints the verdicts.
//!
//! Uses real weights unless `SKIP_MODEL_LOAD=true`, in which case the canned
//! backend answers.

use anyhow::Result;
use neurobreak_engine::{
    utils::{setup_logging, LogConfig},
    EngineBuilder, GuardConfig, InferenceConfig, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LogConfig {
        level: tracing::Level::INFO,
        ..Default::default()
    })
    .map_err(anyhow::Error::msg)?;

    let config = ServiceConfig::from_env();
    let inference = InferenceConfig {
        max_tokens: 128,
        stop_sequences: vec!["\n\n".to_string()],
        ..InferenceConfig::new(config.models.llm_model_id.clone())
    };
    let guard = GuardConfig::new(config.models.guard_model_id.clone(), 0.5)
        .with_auto_block(true)
        .with_categories(["violence", "weapons", "self_harm", "hate"]);

    let engine = EngineBuilder::new().with_config(config).build()?;
    tracing::info!(hardware = %engine.info().hardware, "Engine ready");

    let prompts = [
        "Write a haiku about autumn leaves.",
        "Explain how vaccines train the immune system in two sentences.",
    ];

    for prompt in prompts {
        let result = engine.run_pipeline(prompt, &inference, &guard).await?;
        println!("> {}", prompt);
        println!("{}", result.output);
        println!(
            "[{} / {}] {} prompt tokens, {} completion tokens, {:.1} ms",
            result.moderation.verdict,
            result.moderation.severity,
            result.generation.prompt_tokens,
            result.generation.completion_tokens,
            result.generation.latency_ms
        );
        for reason in &result.moderation.rationale {
            println!("  - {}", reason);
        }
        println!();
    }

    println!("{}", serde_json::to_string_pretty(&engine.metrics())?);
    Ok(())
}
