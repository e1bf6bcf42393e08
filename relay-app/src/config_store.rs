//! Versioned JSON persistence for the assembled bot configuration.
//!
//! One document, written after every successful registration and read once at
//! startup. A version tag guards against rereading a document written by an
//! incompatible build.

use crate::config::BotConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "bot_config.json";
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedDocument {
    version: u32,
    config: BotConfig,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CONFIG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted config. `Ok(None)` when the file is missing or
    /// carries an unsupported version; `Err` only for unreadable content.
    pub async fn load(&self) -> Result<Option<BotConfig>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let raw: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
        if version != u64::from(DOCUMENT_VERSION) {
            tracing::warn!(
                version,
                supported = DOCUMENT_VERSION,
                path = %self.path.display(),
                "persisted bot config has an unsupported version; ignoring it"
            );
            return Ok(None);
        }

        let doc: PersistedDocument = serde_json::from_value(raw)
            .with_context(|| format!("decoding {}", self.path.display()))?;
        Ok(Some(doc.config))
    }

    pub async fn save(&self, config: &BotConfig) -> Result<()> {
        let doc = PersistedDocument {
            version: DOCUMENT_VERSION,
            config: config.clone(),
            saved_at: Utc::now(),
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;

        // The document holds credentials; keep it owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| format!("restricting {}", self.path.display()))?;
        }
        Ok(())
    }
}
