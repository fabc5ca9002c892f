//! The engine's two well-known image files.
//!
//! The live image is what the engine loads on start and writes on `save`; the
//! seed image is a baked copy used to reset the system. Either copy lands in a
//! staging file first and is renamed over the target, so a reader never sees a
//! half-written image.

use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

#[derive(Debug, Clone)]
pub struct SnapshotFiles {
    live: PathBuf,
    seed: PathBuf,
}

impl SnapshotFiles {
    pub fn new(live: impl Into<PathBuf>, seed: impl Into<PathBuf>) -> Self {
        Self {
            live: live.into(),
            seed: seed.into(),
        }
    }

    pub fn live(&self) -> &Path {
        &self.live
    }

    pub fn seed(&self) -> &Path {
        &self.seed
    }

    /// Copy the seed image over the live image. Returns the bytes copied.
    pub async fn restore_seed(&self) -> io::Result<u64> {
        let bytes = replace_file(&self.seed, &self.live).await?;
        info!(
            target = "warbler::cache::snapshot",
            bytes,
            from = %self.seed.display(),
            to = %self.live.display(),
            "restored seed image"
        );
        Ok(bytes)
    }

    /// Copy the live image over the seed image. Returns the bytes copied.
    pub async fn capture_seed(&self) -> io::Result<u64> {
        let bytes = replace_file(&self.live, &self.seed).await?;
        info!(
            target = "warbler::cache::snapshot",
            bytes,
            from = %self.live.display(),
            to = %self.seed.display(),
            "captured seed image"
        );
        Ok(bytes)
    }
}

async fn replace_file(source: &Path, target: &Path) -> io::Result<u64> {
    let mut staging = target.as_os_str().to_owned();
    staging.push(".incoming");
    let staging = PathBuf::from(staging);

    let bytes = tokio::fs::copy(source, &staging).await?;
    tokio::fs::rename(&staging, target).await?;
    Ok(bytes)
}
