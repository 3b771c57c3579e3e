//! Idempotent bootstrap of `<data_home>/agents/<namespace>` trees.
//!
//! Safe to run repeatedly: existing directories and files are left
//! untouched, and only what was actually created is reported.

use std::path::{Path, PathBuf};

use eidolon_core::{Error, Result};

/// What one bootstrap call actually created.
#[derive(Debug, Clone)]
pub struct BootstrapResult {
    pub namespace: String,
    pub agent_root: PathBuf,
    pub created_dirs: Vec<PathBuf>,
    pub created_files: Vec<PathBuf>,
}

/// Create the directory tree and seed files for one namespace.
pub fn bootstrap_namespace(data_home: &Path, namespace: &str) -> Result<BootstrapResult> {
    let normalized = normalize_namespace(namespace)?;
    let root = data_home.join("agents").join(&normalized);

    let required_dirs = [
        root.join("memory").join("memory"),
        root.join("qmd").join("xdg-config"),
        root.join("qmd").join("xdg-cache"),
    ];
    let mut created_dirs = Vec::new();
    for dir in &required_dirs {
        let existed = dir.exists();
        std::fs::create_dir_all(dir)?;
        if !existed {
            created_dirs.push(dir.clone());
        }
    }

    let required_files = [
        (root.join("memory").join("MEMORY.md"), seed_memory()),
        (
            root.join("character-card.json"),
            card_template(&normalized),
        ),
    ];
    let mut created_files = Vec::new();
    for (path, content) in &required_files {
        if write_if_missing(path, content)? {
            created_files.push(path.clone());
        }
    }

    Ok(BootstrapResult {
        namespace: normalized,
        agent_root: root,
        created_dirs,
        created_files,
    })
}

/// Lowercase, then enforce `[a-z0-9][a-z0-9_-]{1,63}`.
fn normalize_namespace(value: &str) -> Result<String> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(Error::Config {
            message: "Namespace is required".into(),
        });
    }

    let mut chars = normalized.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    let len = normalized.len();

    if !first_ok || !rest_ok || !(2..=64).contains(&len) {
        return Err(Error::Config {
            message: "Namespace must match [a-z0-9][a-z0-9_-]{1,63}".into(),
        });
    }
    Ok(normalized)
}

fn seed_memory() -> String {
    "# MEMORY\n\n".into()
}

fn card_template(namespace: &str) -> String {
    format!(
        r#"{{
  "name": "{namespace}",
  "description": "",
  "personality": "",
  "background": "",
  "stats": {{
    "STR": 50,
    "CON": 50,
    "DEX": 50,
    "INT": 50,
    "POW": 50,
    "APP": 50,
    "SIZ": 50,
    "EDU": 50,
    "HP": 10,
    "SAN": 50,
    "MP": 10
  }},
  "skills": {{}},
  "inventory": []
}}
"#
    )
}

fn write_if_missing(path: &Path, content: &str) -> Result<bool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(mut file) => {
            use std::io::Write;
            file.write_all(content.as_bytes())?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}
