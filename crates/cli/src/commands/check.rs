//! `eidolon check` — Validate configuration and print a redacted summary.

use eidolon_config::AppConfig;
use eidolon_core::ProcessEnv;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env = ProcessEnv::from_process();
    let config = AppConfig::load(&env).map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Eidolon configuration OK");
    println!("{}", serde_json::to_string_pretty(&config.summary())?);

    let api_key_set = env
        .get(&config.model.api_key_env)
        .is_some_and(|v| !v.trim().is_empty());
    if api_key_set {
        println!("\n  API key: set ({})", config.model.api_key_env);
    } else {
        println!(
            "\n  WARNING: {} is not set — completions will fail",
            config.model.api_key_env
        );
    }

    if !config.agent.character_card_path.exists() {
        println!(
            "  WARNING: character card not found at {} — run `eidolon init` first",
            config.agent.character_card_path.display()
        );
    }

    Ok(())
}
