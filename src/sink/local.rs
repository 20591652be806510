use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::range::DateRange;
use crate::error::{Error, Result};
use crate::sink::TransferSink;

pub const DEFAULT_DOWNLOAD_FOLDER: &str = "gmail_attachments";
pub const LOCAL_LOG_FILE: &str = "download_log.json";

const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// Writes attachments into one folder, never overwriting an existing file.
pub struct LocalSink {
    folder: PathBuf,
}

impl LocalSink {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let s: String = name
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    if s.trim().is_empty() {
        "attachment".to_string()
    } else {
        s
    }
}

fn split_extension(filename: &str) -> (&str, &str) {
    // A leading dot (".pdf") is a name, not an extension.
    match filename.rfind('.') {
        Some(i) if i > 0 => (&filename[..i], &filename[i..]),
        _ => (filename, ""),
    }
}

/// Create `dir/filename` exclusively, falling back to `stem_1.ext`,
/// `stem_2.ext`, … while names are taken. Returns the path written.
fn write_unique(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let (stem, ext) = split_extension(filename);

    for counter in 0..=MAX_COLLISION_SUFFIX {
        let candidate = if counter == 0 {
            dir.join(filename)
        } else {
            dir.join(format!("{stem}_{counter}{ext}"))
        };

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => {
                fill_or_remove(&candidate, file, content)?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::io(&candidate, e)),
        }
    }

    Err(Error::io(
        dir.join(filename),
        std::io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    ))
}

/// Write `content` through `out`; on failure delete the partly written file
/// at `path` so its name is free again.
fn fill_or_remove(path: &Path, mut out: impl Write, content: &[u8]) -> Result<()> {
    let written = out.write_all(content).and_then(|()| out.flush());
    drop(out);
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path) {
            log::warn!("Could not remove partial file {}: {cleanup}", path.display());
        }
        return Err(Error::io(path, e));
    }
    Ok(())
}

impl TransferSink for LocalSink {
    fn store(&self, bytes: &[u8], filename: &str, _mime_type: &str) -> Result<String> {
        fs::create_dir_all(&self.folder).map_err(|e| Error::io(&self.folder, e))?;

        let safe = sanitize_filename(filename);
        let path = write_unique(&self.folder, &safe, bytes)?;
        log::info!("Downloaded: {} ({} bytes)", path.display(), bytes.len());
        Ok(path.to_string_lossy().into_owned())
    }

    fn destination(&self) -> String {
        self.folder.display().to_string()
    }

    fn log_path(&self, _range: &DateRange) -> PathBuf {
        self.folder.join(LOCAL_LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_every_unsafe_char() {
        assert_eq!(sanitize_filename("a:b/c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_filename(r#"<x>"y"\z|?*.pdf"#), "_x__y__z___.pdf");
        assert_eq!(sanitize_filename("Fäktura 2024.pdf"), "Fäktura 2024.pdf");
        assert_eq!(sanitize_filename(""), "attachment");
    }

    #[test]
    fn split_extension_keeps_last_dot() {
        assert_eq!(split_extension("a.tar.pdf"), ("a.tar", ".pdf"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".pdf"), (".pdf", ""));
    }

    #[test]
    fn collisions_get_numbered_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::new(dir.path().join("out"));

        let first = sink.store(b"one", "a.pdf", "application/pdf").unwrap();
        let second = sink.store(b"two", "a.pdf", "application/pdf").unwrap();
        let third = sink.store(b"three", "a.pdf", "application/pdf").unwrap();

        assert!(first.ends_with("a.pdf"));
        assert!(second.ends_with("a_1.pdf"));
        assert!(third.ends_with("a_2.pdf"));
        assert_eq!(fs::read(dir.path().join("out/a.pdf")).unwrap(), b"one");
        assert_eq!(fs::read(dir.path().join("out/a_1.pdf")).unwrap(), b"two");
        assert_eq!(fs::read(dir.path().join("out/a_2.pdf")).unwrap(), b"three");
    }

    #[test]
    fn unsafe_names_are_written_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalSink::new(dir.path());
        let dest = sink
            .transfer(b"%PDF", "2024/01: invoice.pdf", "application/pdf")
            .unwrap();
        assert!(dest.ends_with("2024_01_ invoice.pdf"));
        assert!(dir.path().join("2024_01_ invoice.pdf").exists());
    }

    #[test]
    fn transfer_failure_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();
        let sink = LocalSink::new(&blocker);
        assert!(sink.transfer(b"x", "a.pdf", "application/pdf").is_none());
    }

    /// Accepts a few bytes, then fails like a full disk.
    struct FullDisk {
        inner: fs::File,
        room: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.room == 0 {
                return Err(std::io::Error::other("no space left on device"));
            }
            let n = buf.len().min(self.room);
            self.room -= n;
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .unwrap();

        let err = fill_or_remove(&path, FullDisk { inner: file, room: 4 }, b"%PDF-1.7 body")
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!path.exists());

        // The name is free again for the next attempt.
        let sink = LocalSink::new(dir.path());
        let dest = sink.store(b"%PDF-1.7 body", "a.pdf", "application/pdf").unwrap();
        assert!(dest.ends_with("a.pdf"));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7 body");
    }

    #[test]
    fn successful_write_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.pdf");
        let file = fs::File::create(&path).unwrap();
        fill_or_remove(&path, file, b"ok").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ok");
    }

    #[test]
    fn log_lives_in_folder() {
        let sink = LocalSink::new("some/folder");
        let r = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(sink.log_path(&r), Path::new("some/folder/download_log.json"));
        assert_eq!(sink.destination(), "some/folder");
    }
}
