use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::auth::Session;

const SESSION_FILE: &str = "session.toml";

/// Client-side persistent state: currently only the login session.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let session_path = data_dir.join(SESSION_FILE);
        info!(
            data_dir = %data_dir.display(),
            session = %session_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            session_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_session(&self) -> anyhow::Result<Option<Session>> {
        if !self.session_path.exists() {
            debug!("no stored session");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed to read {}", self.session_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let session: Session = toml::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        debug!(username = %session.username, "loaded stored session");
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session), fields(username = %session.username))]
    pub fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let serialized = toml::to_string(session).context("failed to serialize session")?;
        write_atomic(&self.session_path, serialized.as_bytes())
            .context("failed to save session.toml")
    }

    /// Removes the stored session. Returns whether one existed.
    #[tracing::instrument(skip(self))]
    pub fn clear_session(&self) -> anyhow::Result<bool> {
        if !self.session_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.session_path)
            .with_context(|| format!("failed to remove {}", self.session_path.display()))?;
        info!("cleared stored session");
        Ok(true)
    }
}

#[tracing::instrument(skip(path, contents))]
fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing file atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
