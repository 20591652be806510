use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One hit of a message search. Only `id` is used downstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A message as returned by `messages.get?format=full`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A node of the MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub part_id: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub attachment_id: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

/// Header metadata kept for the run log. Absent headers are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageInfo {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub internal_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRecord {
    pub filename: String,
    pub attachment_id: String,
    pub size: u64,
    pub mime_type: String,
    pub transferred: bool,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadLogEntry {
    pub message_info: MessageInfo,
    pub attachments: Vec<AttachmentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total_messages: usize,
    pub total_attachments: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub destination: String,
    pub log_file: Option<PathBuf>,
}

impl RunSummary {
    /// Summary for a run that found nothing to do.
    pub fn empty(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== TRANSFER SUMMARY ===")?;
        writeln!(f, "Messages processed: {}", self.total_messages)?;
        writeln!(f, "Total attachments: {}", self.total_attachments)?;
        writeln!(f, "Successfully transferred: {}", self.success_count)?;
        writeln!(f, "Failed transfers: {}", self.failure_count)?;
        write!(f, "Destination: {}", self.destination)?;
        if let Some(p) = &self.log_file {
            write!(f, "\nLog file: {}", p.display())?;
        }
        Ok(())
    }
}
