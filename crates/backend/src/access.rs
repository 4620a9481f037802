//! Key and repository access policy.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use sluice_core::LeasePath;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// A sub-path of one repository a key may lease.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyPermission {
    /// Repository the permission applies to.
    pub repository: String,
    /// Allowed sub-path prefix; "/" grants the whole repository.
    #[serde(default = "default_permission_path")]
    pub path: String,
}

fn default_permission_path() -> String {
    "/".to_string()
}

/// The policy attached to one key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Credential identifier.
    pub id: String,
    /// Per-repository allow list.
    #[serde(default)]
    pub repositories: Vec<KeyPermission>,
}

/// Per-repository gateway settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Repository name (leading lease path segment).
    pub name: String,
    /// Writes are rejected while disabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Deserialize)]
struct AccessFile {
    #[serde(default)]
    keys: Vec<KeyConfig>,
    #[serde(default)]
    repositories: Vec<RepositoryConfig>,
}

/// Answers "may key K lease path P?" and "is repository R enabled?".
///
/// Keys are immutable for the lifetime of the process; the per-repository
/// enabled flag is the only mutable piece of state.
pub struct AccessConfig {
    keys: HashMap<String, KeyConfig>,
    enabled: RwLock<HashMap<String, bool>>,
}

impl AccessConfig {
    /// Load the policy from a JSON file.
    pub fn load(path: &Path) -> GatewayResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            GatewayError::AccessConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: AccessFile = serde_json::from_slice(&data)
            .map_err(|e| GatewayError::AccessConfig(e.to_string()))?;
        Ok(Self::from_parts(file.keys, file.repositories))
    }

    /// Assemble a policy directly, bypassing the file.
    pub fn from_parts(keys: Vec<KeyConfig>, repositories: Vec<RepositoryConfig>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.id.clone(), k)).collect(),
            enabled: RwLock::new(
                repositories
                    .into_iter()
                    .map(|r| (r.name, r.enabled))
                    .collect(),
            ),
        }
    }

    /// Look up a key's configuration. Unknown keys yield `None`, never
    /// an error.
    pub fn key_config(&self, key_id: &str) -> Option<&KeyConfig> {
        self.keys.get(key_id)
    }

    /// Whether the key may lease the given path.
    pub fn key_may_lease(&self, key_id: &str, lease_path: &LeasePath) -> bool {
        let Some(key) = self.keys.get(key_id) else {
            return false;
        };
        key.repositories.iter().any(|perm| {
            if perm.repository != lease_path.repository() {
                return false;
            }
            let prefix = perm.path.trim_matches('/');
            if prefix.is_empty() {
                return true;
            }
            lease_path.is_under(&format!("{}/{}", perm.repository, prefix))
        })
    }

    /// Look up a repository's configuration.
    pub fn repo_config(&self, name: &str) -> Option<RepositoryConfig> {
        let enabled = self.enabled.read().expect("repo map poisoned");
        enabled.get(name).map(|&enabled| RepositoryConfig {
            name: name.to_string(),
            enabled,
        })
    }

    /// Snapshot of every configured repository.
    pub fn repos(&self) -> Vec<RepositoryConfig> {
        let enabled = self.enabled.read().expect("repo map poisoned");
        let mut repos: Vec<_> = enabled
            .iter()
            .map(|(name, &enabled)| RepositoryConfig {
                name: name.clone(),
                enabled,
            })
            .collect();
        repos.sort_by(|a, b| a.name.cmp(&b.name));
        repos
    }

    /// Toggle a repository's enabled flag.
    pub fn set_repo_enabled(&self, name: &str, value: bool) -> GatewayResult<()> {
        let mut enabled = self.enabled.write().expect("repo map poisoned");
        match enabled.get_mut(name) {
            Some(flag) => {
                *flag = value;
                Ok(())
            }
            None => Err(GatewayError::UnknownRepository(name.to_string())),
        }
    }
}
