//! Persona identity hot-swap with archive isolation.
//!
//! Swapping the active persona must never leak one persona's memories
//! into the next: the old namespace tree is moved aside into a
//! timestamped archive before the new namespace is bootstrapped. The
//! platform layer can observe the swap through a refresh hook (e.g. to
//! rename the bot's displayed identity).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use eidolon_core::{Error, Result};
use tracing::info;

use crate::bootstrap::bootstrap_namespace;

/// One persona identity: display name, card, and memory namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentIdentity {
    pub persona_name: String,
    pub character_card_path: PathBuf,
    pub memory_namespace: String,
}

impl AgentIdentity {
    pub fn new(
        persona_name: impl Into<String>,
        character_card_path: impl Into<PathBuf>,
        memory_namespace: impl Into<String>,
    ) -> Result<Self> {
        let persona_name = persona_name.into().trim().to_string();
        let memory_namespace = memory_namespace.into().trim().to_lowercase();
        let character_card_path = character_card_path.into();
        if persona_name.is_empty() {
            return Err(Error::Config {
                message: "persona_name cannot be empty".into(),
            });
        }
        if memory_namespace.is_empty() {
            return Err(Error::Config {
                message: "memory_namespace cannot be empty".into(),
            });
        }
        if character_card_path.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "character_card_path cannot be empty".into(),
            });
        }
        Ok(Self {
            persona_name,
            character_card_path,
            memory_namespace,
        })
    }
}

/// Observer for identity swaps; lets the platform layer rename the
/// visible bot identity before the swap is committed.
#[async_trait]
pub trait IdentityRefreshHook: Send + Sync {
    async fn refresh_identity(&self, display_name: &str) -> Result<()>;
}

/// What one swap did.
#[derive(Debug, Clone)]
pub struct HotSwapOutcome {
    pub old_identity: AgentIdentity,
    pub new_identity: AgentIdentity,
    /// Where the old namespace tree was moved; `None` when it never
    /// existed on disk.
    pub archive_dir: Option<PathBuf>,
    pub new_agent_root: PathBuf,
}

/// Owns the current persona identity and performs swaps.
pub struct IdentityManager {
    data_home: PathBuf,
    current: AgentIdentity,
    hook: Option<Arc<dyn IdentityRefreshHook>>,
}

impl IdentityManager {
    pub fn new(data_home: impl Into<PathBuf>, initial: AgentIdentity) -> Self {
        Self {
            data_home: data_home.into(),
            current: initial,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn IdentityRefreshHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn current(&self) -> &AgentIdentity {
        &self.current
    }

    /// Swap to `new_identity`: archive the old namespace tree, bootstrap
    /// the new one, notify the refresh hook, then commit. A hook failure
    /// aborts the commit and the current identity is left unchanged.
    pub async fn hot_swap(&mut self, new_identity: AgentIdentity) -> Result<HotSwapOutcome> {
        let old_root = self.agent_root(&self.current.memory_namespace);
        let archive_dir = self.archive_old_root(&self.current.memory_namespace, &old_root)?;
        let bootstrap = bootstrap_namespace(&self.data_home, &new_identity.memory_namespace)?;

        if let Some(hook) = &self.hook {
            hook.refresh_identity(&new_identity.persona_name)
                .await
                .map_err(|e| Error::Internal(format!("Identity refresh hook failed: {e}")))?;
        }

        let old_identity = std::mem::replace(&mut self.current, new_identity.clone());
        info!(
            old_namespace = %old_identity.memory_namespace,
            new_namespace = %new_identity.memory_namespace,
            archived = archive_dir.is_some(),
            "identity_swapped"
        );
        Ok(HotSwapOutcome {
            old_identity,
            new_identity,
            archive_dir,
            new_agent_root: bootstrap.agent_root,
        })
    }

    fn archive_old_root(&self, namespace: &str, old_root: &Path) -> Result<Option<PathBuf>> {
        if !old_root.exists() {
            return Ok(None);
        }
        let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let archive_dir = self
            .data_home
            .join("archive")
            .join(format!("{namespace}-{timestamp}"));
        if let Some(parent) = archive_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(old_root, &archive_dir)?;
        Ok(Some(archive_dir))
    }

    fn agent_root(&self, namespace: &str) -> PathBuf {
        self.data_home.join("agents").join(namespace)
    }
}
