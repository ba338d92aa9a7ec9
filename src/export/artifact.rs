use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::encode::session::WEBM_MEDIA_TYPE;
use crate::foundation::error::DataraceResult;

/// One finished export: a complete WebM file held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested file name, `datarace-<unix millis>.webm`.
    pub file_name: String,
    /// Media type of `bytes`.
    pub media_type: &'static str,
    /// Encoded bytes (immutable once assembled).
    pub bytes: Arc<[u8]>,
}

impl Artifact {
    /// Concatenate encoder chunks in arrival order.
    pub fn from_chunks(chunks: &[Vec<u8>], at: SystemTime) -> Self {
        let bytes: Vec<u8> = chunks.concat();
        Self {
            file_name: artifact_file_name(at),
            media_type: WEBM_MEDIA_TYPE,
            bytes: bytes.into(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` when no bytes were produced.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `datarace-<unix millis>.webm`.
pub fn artifact_file_name(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("datarace-{millis}.webm")
}

/// Receives a finished artifact. Called synchronously at the end of an export.
pub trait ArtifactDelivery: Send {
    /// Hand the artifact to the user.
    fn deliver(&mut self, artifact: &Artifact) -> DataraceResult<()>;
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDelivery {
    dir: PathBuf,
    delivered: Vec<PathBuf>,
}

impl DirectoryDelivery {
    /// Deliver into `dir` (created on first delivery).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delivered: Vec::new(),
        }
    }

    /// Paths written so far.
    pub fn delivered(&self) -> &[PathBuf] {
        &self.delivered
    }

    fn free_path(&self, file_name: &str) -> PathBuf {
        let first = self.dir.join(file_name);
        if !first.exists() {
            return first;
        }
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_owned());
        (1u32..)
            .map(|n| self.dir.join(format!("{stem}-{n}.webm")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

impl ArtifactDelivery for DirectoryDelivery {
    fn deliver(&mut self, artifact: &Artifact) -> DataraceResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir '{}'", self.dir.display()))?;
        let path = self.free_path(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes)
            .with_context(|| format!("write artifact '{}'", path.display()))?;
        tracing::info!(path = %path.display(), bytes = artifact.len(), "artifact delivered");
        self.delivered.push(path);
        Ok(())
    }
}

/// Delivery test double collecting artifacts in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDelivery {
    artifacts: Arc<Mutex<Vec<Artifact>>>,
}

impl InMemoryDelivery {
    /// Empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifacts delivered so far.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ArtifactDelivery for InMemoryDelivery {
    fn deliver(&mut self, artifact: &Artifact) -> DataraceResult<()> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(artifact.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/artifact.rs"]
mod tests;
