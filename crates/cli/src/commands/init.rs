//! `eidolon init` — Bootstrap the namespace directory tree.

use eidolon_config::AppConfig;
use eidolon_core::ProcessEnv;
use eidolon_memory::bootstrap_namespace;

pub async fn run(namespace: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let env = ProcessEnv::from_process();
    let config = AppConfig::load(&env).map_err(|e| format!("Failed to load config: {e}"))?;

    let namespace = namespace.unwrap_or_else(|| config.agent.memory_namespace.clone());
    let result = bootstrap_namespace(&config.runtime.data_home, &namespace)?;

    println!("Namespace '{}' ready at {}", result.namespace, result.agent_root.display());
    for dir in &result.created_dirs {
        println!("  created dir  {}", dir.display());
    }
    for file in &result.created_files {
        println!("  created file {}", file.display());
    }
    if result.created_dirs.is_empty() && result.created_files.is_empty() {
        println!("  nothing to do — already bootstrapped");
    }

    Ok(())
}
