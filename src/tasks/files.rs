use anyhow::{Context, Result, bail, ensure};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

pub const TEMP_EXTENSION: &str = "tmp";

/// Displayable formats `image::guess_format` has no signature for.
const UNSNIFFED_FORMATS: [&str; 3] = ["tga", "mng", "pcx"];

/// Downloads older than this are never kept, whatever the hold time.
const MIN_RETENTION: Duration = Duration::from_secs(10);

/// Scratch directory holding the downloaded originals as `{id}.tmp`.
#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        info!(dir = %self.dir.display(), "download directory ready");
        Ok(())
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        ensure!(is_safe_id(id), "asset id {id:?} is not usable as a file name");
        Ok(self.dir.join(format!("{id}.{TEMP_EXTENSION}")))
    }

    /// Writes `bytes` to the asset's temp file.
    ///
    /// The bytes must carry a known image signature unless `mime_type` names
    /// a format that has none, in which case the server's mime type is trusted.
    pub async fn store(&self, id: &str, mime_type: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(id)?;
        ensure!(!bytes.is_empty(), "download for {id} is empty");
        let format = match image::guess_format(bytes) {
            Ok(format) => Some(format),
            Err(_) if is_unsniffed(mime_type) => None,
            Err(err) => bail!("download for {id} is not a recognised image: {err}"),
        };
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(
            path = %path.display(),
            bytes = bytes.len(),
            format = ?format,
            mime_type,
            "stored download"
        );
        Ok(path)
    }

    /// Removes temp files whose last modification is older than `max_age`.
    pub fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        self.purge_where(|modified| {
            modified
                .and_then(|m| now.duration_since(m).ok())
                .is_none_or(|age| age > max_age)
        })
    }

    pub fn purge_all(&self) -> Result<usize> {
        self.purge_where(|_| true)
    }

    fn purge_where(&self, expired: impl Fn(Option<SystemTime>) -> bool) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !is_temp_file(&path) {
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified()).ok();
            if !expired(modified) {
                continue;
            }
            match delete_if_exists(&path) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => warn!(path = %path.display(), "purge: {err:#}"),
            }
        }
        if removed > 0 {
            debug!(removed, dir = %self.dir.display(), "purged downloads");
        }
        Ok(removed)
    }
}

/// How long a download may linger before the next purge removes it.
pub fn retention_for(hold: Duration) -> Duration {
    (hold * 2).max(MIN_RETENTION)
}

fn is_unsniffed(mime_type: &str) -> bool {
    let mime_type = mime_type.to_ascii_lowercase();
    UNSNIFFED_FORMATS.iter().any(|ext| mime_type.ends_with(ext))
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[inline]
fn is_temp_file(p: &Path) -> bool {
    p.is_file() && p.extension().and_then(OsStr::to_str) == Some(TEMP_EXTENSION)
}

fn delete_if_exists(p: &Path) -> Result<bool> {
    match fs::remove_file(p) {
        Ok(_) => {
            debug!(path = %p.display(), "delete: removed");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "delete: source vanished during remove; skipping");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
