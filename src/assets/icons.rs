use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::assets::decode::decode_icon;
use crate::assets::store::PreparedImage;
use crate::foundation::error::{DataraceError, DataraceResult};

/// Fetches and decodes one icon. Runs on a background thread.
pub trait IconLoader: Send + Sync {
    /// Load the icon referenced by `url`.
    fn load(&self, url: &str) -> DataraceResult<PreparedImage>;
}

#[derive(Debug)]
enum IconSlot {
    Ready(Arc<PreparedImage>),
    Failed,
}

/// Handle to one cache entry.
///
/// The slot is filled exactly once by the loader thread. Until then [`IconHandle::ready_image`]
/// returns `None`, and it keeps returning `None` forever if loading failed.
#[derive(Clone, Debug)]
pub struct IconHandle {
    slot: Arc<OnceLock<IconSlot>>,
}

impl IconHandle {
    fn pending() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }

    fn fill(&self, slot: IconSlot) {
        let _ = self.slot.set(slot);
    }

    /// The decoded image, or `None` while loading (or after a failed load).
    pub fn ready_image(&self) -> Option<Arc<PreparedImage>> {
        match self.slot.get() {
            Some(IconSlot::Ready(img)) => Some(img.clone()),
            _ => None,
        }
    }

    /// `true` once loading has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        self.slot.get().is_some()
    }

    /// `true` when loading finished with an error.
    pub fn is_failed(&self) -> bool {
        matches!(self.slot.get(), Some(IconSlot::Failed))
    }
}

/// URL-keyed icon cache.
///
/// [`IconCache::request`] inserts a pending placeholder synchronously and starts at most one
/// background load per URL. Drawing code reads handles every frame and never waits.
pub struct IconCache {
    entries: Mutex<HashMap<String, IconHandle>>,
    loader: Arc<dyn IconLoader>,
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache").finish_non_exhaustive()
    }
}

impl IconCache {
    /// Create a cache backed by `loader`.
    pub fn new(loader: Arc<dyn IconLoader>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            loader,
        }
    }

    /// The process-wide cache, backed by [`DefaultIconLoader`].
    pub fn global() -> Arc<IconCache> {
        static GLOBAL: OnceLock<Arc<IconCache>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(IconCache::new(Arc::new(DefaultIconLoader::default()))))
            .clone()
    }

    /// Return the handle for `url`, starting a background load on first request.
    pub fn request(&self, url: &str) -> IconHandle {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(h) = entries.get(url) {
            return h.clone();
        }

        let handle = IconHandle::pending();
        entries.insert(url.to_owned(), handle.clone());
        drop(entries);

        let loader = self.loader.clone();
        let url_owned = url.to_owned();
        let fill = handle.clone();
        let spawned = std::thread::Builder::new()
            .name("datarace-icon".to_owned())
            .spawn(move || match loader.load(&url_owned) {
                Ok(img) => {
                    tracing::debug!(url = %url_owned, w = img.width, h = img.height, "icon loaded");
                    fill.fill(IconSlot::Ready(Arc::new(img)));
                }
                Err(e) => {
                    tracing::warn!(url = %url_owned, error = %e, "icon load failed");
                    fill.fill(IconSlot::Failed);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(url, error = %e, "failed to spawn icon loader thread");
            handle.fill(IconSlot::Failed);
        }
        handle
    }

    /// Request every URL in `urls` and wait up to `timeout` for all of them to settle.
    ///
    /// Returns `false` if the timeout elapsed first. Loads still in flight keep running.
    pub fn preload<'a>(&self, urls: impl IntoIterator<Item = &'a str>, timeout: Duration) -> bool {
        let handles: Vec<IconHandle> = urls.into_iter().map(|u| self.request(u)).collect();
        let deadline = Instant::now() + timeout;
        while !handles.iter().all(IconHandle::is_settled) {
            if Instant::now() >= deadline {
                let pending = handles.iter().filter(|h| !h.is_settled()).count();
                tracing::warn!(pending, "icons still loading after timeout");
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Number of URLs ever requested.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// `true` when nothing has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads icons from `http(s)` URLs or from the local filesystem.
///
/// Relative paths resolve against `base_dir` (the dataset's directory for the CLI).
#[derive(Debug, Clone)]
pub struct DefaultIconLoader {
    base_dir: PathBuf,
    http: Option<reqwest::blocking::Client>,
}

impl Default for DefaultIconLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl DefaultIconLoader {
    /// Create a loader resolving relative paths against `base_dir`.
    ///
    /// One HTTP client is built here and shared by every fetch (and every clone).
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("datarace/", env!("CARGO_PKG_VERSION")))
            .build()
            .inspect_err(|e| {
                tracing::warn!(error = %e, "http client unavailable; remote icons disabled");
            })
            .ok();
        Self {
            base_dir: base_dir.into(),
            http,
        }
    }

    fn fetch(&self, url: &str) -> DataraceResult<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let Some(client) = self.http.as_ref() else {
                return Err(DataraceError::Other(anyhow::anyhow!(
                    "GET {url}: http client unavailable"
                )));
            };
            let resp = client
                .get(url)
                .send()
                .with_context(|| format!("GET {url}"))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(DataraceError::Other(anyhow::anyhow!(
                    "GET {url}: http status {status}"
                )));
            }
            let bytes = resp.bytes().with_context(|| format!("read body of {url}"))?;
            return Ok(bytes.to_vec());
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        let p = self.base_dir.join(path);
        Ok(std::fs::read(&p).with_context(|| format!("read icon '{}'", p.display()))?)
    }
}

impl IconLoader for DefaultIconLoader {
    fn load(&self, url: &str) -> DataraceResult<PreparedImage> {
        let bytes = self.fetch(url)?;
        decode_icon(&bytes)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/icons.rs"]
mod tests;
