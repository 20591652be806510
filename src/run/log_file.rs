use std::fs;
use std::path::Path;

use crate::domain::message::DownloadLogEntry;
use crate::error::{Error, Result};

/// Write the whole run log as pretty JSON (two-space indent, UTF-8 kept as-is).
pub fn save_download_log(path: &Path, entries: &[DownloadLogEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }
    let mut s = serde_json::to_string_pretty(entries)?;
    s.push('\n');
    fs::write(path, s).map_err(|e| Error::io(path, e))?;
    Ok(())
}
