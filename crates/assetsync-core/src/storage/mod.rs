//! Local file lifecycle for transfers.
//!
//! File downloads stream into a `.part` sibling that is renamed into place on
//! success and removed on failure or cancellation. Cached rendition bytes are
//! staged in a temp file in the cache directory and renamed into place
//! once the entry is accepted.

mod part;
mod sink;

pub use part::PartFile;
pub use sink::ByteSink;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.jpg` → `a.jpg.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Bytes written and synced to a temp file next to `final_path`, not yet
/// visible there. Dropping it discards the temp file.
pub struct StagedFile {
    tmp: tempfile::NamedTempFile,
    final_path: PathBuf,
}

impl StagedFile {
    pub fn write(final_path: &Path, data: &[u8]) -> io::Result<Self> {
        let dir = final_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        Ok(Self {
            tmp,
            final_path: final_path.to_path_buf(),
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Rename into place. Readers see either the old file or the complete new one.
    pub fn persist(self) -> io::Result<()> {
        self.tmp.persist(&self.final_path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Remove a file, ignoring "not found". Other errors are logged.
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "failed to remove file"),
    }
}

/// Regular-file check used by upload validation. Returns the file size.
pub fn regular_file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}
