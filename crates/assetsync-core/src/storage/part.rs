//! `.part` staging file for streamed downloads.

use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use super::{remove_quietly, temp_path, ByteSink};

/// A download in progress. Bytes go to `<dest>.part`; [`PartFile::finalize`]
/// renames it over `dest`. Dropping without finalizing deletes the temp file.
pub struct PartFile {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) the temp file next to `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(Self {
            file: Some(BufWriter::new(file)),
            temp_path,
            final_path: final_path.to_path_buf(),
            written: 0,
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync and rename into place. Returns the number of bytes written.
    /// On error the temp file is removed.
    pub fn finalize(mut self) -> io::Result<u64> {
        if let Err(e) = self.commit() {
            remove_quietly(&self.temp_path);
            return Err(e);
        }
        tracing::debug!(
            path = %self.final_path.display(),
            bytes = self.written,
            "download finalized"
        );
        Ok(self.written)
    }

    fn commit(&mut self) -> io::Result<()> {
        if let Some(writer) = self.file.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        std::fs::rename(&self.temp_path, &self.final_path)
    }
}

impl ByteSink for PartFile {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("part file already finalized"))?;
        writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        if let Some(writer) = self.file.as_mut() {
            writer.flush()?;
            let file = writer.get_mut();
            file.set_len(0)?;
            file.rewind()?;
        }
        self.written = 0;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            remove_quietly(&self.temp_path);
        }
    }
}
