mod discovery;

pub use discovery::{ProbeProjectResolver, ProjectIdPatterns, ProjectResolver};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::CredentialError;

/// One express-mode API key and its position in the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    key: String,
}

impl Credential {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("key", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    RoundRobin,
    #[default]
    Random,
}

/// Shared set of upstream credentials.
///
/// Selection state and the project cache are guarded separately: the cursor
/// by a plain mutex (held for one increment), the cache by an async rwlock
/// because discovery runs while callers wait on it.
pub struct CredentialPool {
    credentials: Vec<Credential>,
    policy: SelectionPolicy,
    cursor: Mutex<usize>,
    projects: RwLock<HashMap<usize, String>>,
    resolver: Arc<dyn ProjectResolver>,
}

impl CredentialPool {
    pub fn new(
        keys: Vec<String>,
        policy: SelectionPolicy,
        resolver: Arc<dyn ProjectResolver>,
    ) -> Result<Self, CredentialError> {
        if keys.is_empty() {
            return Err(CredentialError::EmptyPool);
        }
        let credentials = keys
            .into_iter()
            .enumerate()
            .map(|(index, key)| Credential { index, key })
            .collect();
        Ok(Self {
            credentials,
            policy,
            cursor: Mutex::new(0),
            projects: RwLock::new(HashMap::new()),
            resolver,
        })
    }

    /// Seeds every credential with a fixed project so discovery never runs.
    pub fn with_fixed_project(mut self, project: Option<String>) -> Self {
        if let Some(project) = project.filter(|p| !p.trim().is_empty()) {
            let cache = self.projects.get_mut();
            for credential in &self.credentials {
                cache.insert(credential.index, project.clone());
            }
        }
        self
    }

    pub fn count(&self) -> usize {
        self.credentials.len()
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn pick(&self) -> Credential {
        let index = match self.policy {
            SelectionPolicy::RoundRobin => {
                let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
                let index = *cursor;
                *cursor = (index + 1) % self.credentials.len();
                index
            }
            SelectionPolicy::Random => rand::rng().random_range(0..self.credentials.len()),
        };
        self.credentials[index].clone()
    }

    /// Falls back to the first credential when `index` is out of range.
    pub fn pick_at(&self, index: usize) -> Credential {
        self.credentials
            .get(index)
            .unwrap_or(&self.credentials[0])
            .clone()
    }

    pub fn next(&self, index: usize) -> usize {
        let count = self.credentials.len();
        if count <= 1 {
            index
        } else {
            (index + 1) % count
        }
    }

    pub async fn cached_project(&self, index: usize) -> Option<String> {
        self.projects.read().await.get(&index).cloned()
    }

    /// Project id for `credential`, discovering it on first use. A value
    /// already cached is never replaced.
    pub async fn resolve(&self, credential: &Credential) -> Result<String, CredentialError> {
        if let Some(project) = self.cached_project(credential.index).await {
            return Ok(project);
        }

        debug!(
            event = "project_discovery",
            credential_index = credential.index
        );
        let discovered = self
            .resolver
            .discover(&credential.key)
            .await
            .map_err(|err| CredentialError::Unresolved {
                index: credential.index,
                reason: err.to_string(),
            })?;

        let mut cache = self.projects.write().await;
        let project = cache
            .entry(credential.index)
            .or_insert(discovered)
            .clone();
        info!(
            event = "project_discovered",
            credential_index = credential.index,
            project = %project
        );
        Ok(project)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("count", &self.credentials.len())
            .field("policy", &self.policy)
            .finish()
    }
}
