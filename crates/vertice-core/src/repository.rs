//! Source repositories attached to a box and the CI hook managers that
//! install build triggers on them.
//!
//! Managers are looked up by the SCM name recorded on the hook (`github`,
//! `gitlab`, ...). Unknown names resolve to the `nop` manager so a box with an
//! unsupported SCM can still be torn down.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerticeError};
use crate::registry::Registry;

pub const DEFAULT_MANAGER: &str = "github";
pub const NOP_MANAGER: &str = "nop";

/// Operation type on a component that carries CI settings.
pub const CI: &str = "CI";
pub const CI_ENABLED: &str = "ci-enabled";
pub const CI_TOKEN: &str = "ci-token";
pub const CI_SCM: &str = "ci-scm";
pub const CI_USER: &str = "ci-user";
pub const CI_URL: &str = "ci-url";
pub const CI_APIVERSION: &str = "ci-apiversion";

// ---------------------------------------------------------------------------
// Repo / Hook
// ---------------------------------------------------------------------------

/// Source repository a box is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    #[serde(rename = "type")]
    pub repo_type: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub one_click: bool,
    #[serde(default)]
    pub hook: Option<Hook>,
}

impl Repo {
    /// Last path segment of the repository URL, e.g. `app.git`.
    pub fn short_name(&self) -> Result<&str> {
        match self.url.rfind('/') {
            Some(i) => Ok(&self.url[i + 1..]),
            None => Err(VerticeError::Repository(format!(
                "unable to parse repository url '{}'",
                self.url
            ))),
        }
    }

    pub fn ci_enabled(&self) -> bool {
        self.hook.as_ref().is_some_and(|h| h.enabled)
    }
}

/// CI trigger settings for a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    /// Name of the [`RepositoryManager`] that owns this hook.
    #[serde(default)]
    pub scm: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub carton_id: String,
    #[serde(default)]
    pub box_id: String,
}

impl Hook {
    /// Build endpoint the SCM calls back into.
    pub fn trigger_url(&self, api: &str) -> String {
        format!(
            "{}/assembly/build/{}/{}",
            api.trim_end_matches('/'),
            self.carton_id,
            self.box_id
        )
    }

    pub fn manager_name(&self) -> &str {
        if self.scm.is_empty() {
            DEFAULT_MANAGER
        } else {
            &self.scm
        }
    }
}

// ---------------------------------------------------------------------------
// RepositoryManager
// ---------------------------------------------------------------------------

pub trait RepositoryManager: Send + Sync {
    /// Install the build hook, returning the SCM's id for it.
    fn create_hook(&self, repo: &Repo) -> Result<String>;
    fn remove_hook(&self, repo: &Repo) -> Result<()>;
}

/// Manager that accepts every call and does nothing.
pub struct NopManager;

impl RepositoryManager for NopManager {
    fn create_hook(&self, _repo: &Repo) -> Result<String> {
        Ok(String::new())
    }

    fn remove_hook(&self, _repo: &Repo) -> Result<()> {
        Ok(())
    }
}

static MANAGERS: LazyLock<Registry<dyn RepositoryManager>> = LazyLock::new(|| {
    let registry: Registry<dyn RepositoryManager> = Registry::new();
    registry.register(NOP_MANAGER, Arc::new(NopManager));
    registry
});

pub fn register(name: &str, manager: Arc<dyn RepositoryManager>) {
    MANAGERS.register(name, manager);
}

/// Manager registered under `name`, or the `nop` manager.
pub fn manager(name: &str) -> Arc<dyn RepositoryManager> {
    MANAGERS
        .get(name)
        .or_else(|| MANAGERS.get(NOP_MANAGER))
        .unwrap_or_else(|| Arc::new(NopManager))
}
