//! `eidolon card` — Validate a character card file.

use std::path::PathBuf;

use eidolon_config::AppConfig;
use eidolon_core::{CharacterCard, ProcessEnv};

pub async fn run(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path,
        None => {
            let env = ProcessEnv::from_process();
            let config =
                AppConfig::load(&env).map_err(|e| format!("Failed to load config: {e}"))?;
            config.agent.character_card_path
        }
    };

    let card = CharacterCard::load(&path).map_err(|e| format!("Invalid character card: {e}"))?;

    println!("Character card OK: {}", path.display());
    println!("  Name:      {}", card.name);
    println!("  Stats:     {}", card.stats_summary());
    println!("  Skills:    {}", card.skills.len());
    println!("  Inventory: {}", card.inventory_summary());

    Ok(())
}
