//! `eidolon index` — Run one memory index refresh cycle.

use std::sync::Arc;

use eidolon_config::AppConfig;
use eidolon_core::ProcessEnv;
use eidolon_memory::{IndexScheduler, TokioToolRunner};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env = ProcessEnv::from_process();
    let config = AppConfig::load(&env).map_err(|e| format!("Failed to load config: {e}"))?;

    let scheduler = IndexScheduler::new(&config, env, Arc::new(TokioToolRunner));
    if scheduler.run_once().await {
        println!("Index refresh completed");
        Ok(())
    } else {
        Err("Index refresh failed; see log output".into())
    }
}
