//! On-disk session token storage.

use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use apto_api_client::TokenStore;

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
}

/// Token store backed by a JSON file under the user's config directory,
/// so the session survives between CLI invocations. A cleared session
/// removes the file.
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<String>>,
}

impl FileTokenStore {
    pub fn open_default() -> anyhow::Result<Self> {
        let dir = dirs::config_dir()
            .context("no user config directory available")?
            .join("apto-admin");
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
        Ok(Self::open_at(dir.join("session.json")))
    }

    pub fn open_at(path: PathBuf) -> Self {
        let cached = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<SessionFile>(&raw).ok())
            .map(|session| session.token);
        Self {
            path,
            cached: RwLock::new(cached),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load_token(&self) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist_token(&self, token: &str) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        let session = SessionFile {
            token: token.to_string(),
        };
        match serde_json::to_string_pretty(&session) {
            Ok(raw) => {
                if let Err(error) = fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), %error, "failed to write session file");
                }
            }
            Err(error) => warn!(%error, "failed to encode session file"),
        }
    }

    fn clear_token(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            if let Err(error) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), %error, "failed to remove session file");
            }
        }
    }
}
