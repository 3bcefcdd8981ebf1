use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppResult;

/// The directory student photos are saved into.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Opens the upload directory, creating it if it does not exist yet.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves an uploaded file under a fresh `<uuid>_<name>` file name and returns its path.
    pub async fn save(&self, original_name: &str, contents: &[u8]) -> AppResult<PathBuf> {
        let path = self.dir.join(unique_file_name(original_name));
        tokio::fs::write(&path, contents).await?;

        info!("Saved {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }

    /// Removes a previously saved file. Failures are logged and otherwise ignored.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Could not remove {}: {e}", path.display());
        }
    }
}

/// Prefixes the last component of a client-supplied file name with a random UUID.
fn unique_file_name(original_name: &str) -> String {
    let base = Path::new(original_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("photo");

    format!("{}_{base}", Uuid::new_v4())
}
