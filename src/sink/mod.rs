pub mod drive;
pub mod local;

use std::path::PathBuf;

use crate::domain::range::DateRange;
use crate::error::Result;

pub use drive::DriveSink;
pub use local::LocalSink;

/// Where matched attachments end up.
pub trait TransferSink {
    /// Persist `bytes` and return an identifier for where they went.
    fn store(&self, bytes: &[u8], filename: &str, mime_type: &str) -> Result<String>;

    /// Human-readable destination, shown in the run summary.
    fn destination(&self) -> String;

    /// File the run log is written to for this destination.
    fn log_path(&self, range: &DateRange) -> PathBuf;

    /// Like [`TransferSink::store`], but a failure is logged and becomes `None`.
    fn transfer(&self, bytes: &[u8], filename: &str, mime_type: &str) -> Option<String> {
        match self.store(bytes, filename, mime_type) {
            Ok(dest) => Some(dest),
            Err(e) => {
                log::warn!("Error transferring attachment {filename}: {e}");
                None
            }
        }
    }
}
