pub mod log_file;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::message::{AttachmentRecord, DownloadLogEntry, RunSummary};
use crate::domain::range::DateRange;
use crate::error::{Error, Result};
use crate::mail::extract::{AttachmentFilter, extract_matching};
use crate::mail::inspect::extract_info;
use crate::mail::lister::{fetch_message, list_messages_with_attachments};
use crate::mail::query::build_query;
use crate::mail::service::MailService;
use crate::sink::TransferSink;

/// Inputs of a single run, as the user typed them.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub start: String,
    pub end: String,
    pub extra_query: String,
    pub save_log: bool,
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::SeqCst) {
        return Err(Error::Interrupted);
    }
    Ok(())
}

/// Search, fetch and transfer every matching attachment in the request's
/// date range, one message and one attachment at a time.
///
/// Per-message and per-attachment failures are logged and counted; a bad
/// date range is an error; a failed search yields an empty summary. When
/// `cancel` is raised the run stops with [`Error::Interrupted`] and no log is
/// written.
pub fn run(
    mail: &dyn MailService,
    sink: &dyn TransferSink,
    filter: &AttachmentFilter,
    request: &RunRequest,
    cancel: &AtomicBool,
) -> Result<RunSummary> {
    let range = DateRange::parse(&request.start, &request.end)?;
    log::info!(
        "Searching for attachments from {} to {}",
        range.start(),
        range.end()
    );
    log::info!("Destination: {}", sink.destination());

    let query = build_query(&range, &request.extra_query);
    log::info!("Search query: {query}");

    let messages = list_messages_with_attachments(mail, &query);
    if messages.is_empty() {
        log::info!("No messages with attachments found in the specified date range.");
        return Ok(RunSummary::empty(sink.destination()));
    }

    let mut summary = RunSummary {
        total_messages: messages.len(),
        destination: sink.destination(),
        ..RunSummary::default()
    };
    let mut entries: Vec<DownloadLogEntry> = Vec::new();

    for (i, msg_ref) in messages.iter().enumerate() {
        check_cancel(cancel)?;
        log::info!(
            "Processing message {}/{}: {}",
            i + 1,
            messages.len(),
            msg_ref.id
        );

        let Some(message) = fetch_message(mail, &msg_ref.id) else {
            continue;
        };

        let info = extract_info(&message);
        log::info!("Subject: {}", info.subject);
        log::info!("From: {}", info.from);
        log::info!("Date: {}", info.date);

        let parts = match message.payload.as_ref().and_then(|p| p.parts.as_deref()) {
            Some(parts) if !parts.is_empty() => parts,
            _ => continue,
        };

        let mut attachments = extract_matching(parts, filter);
        for record in attachments.iter_mut() {
            check_cancel(cancel)?;
            transfer_one(mail, sink, &message.id, record);
            if record.transferred {
                summary.success_count += 1;
            } else {
                summary.failure_count += 1;
            }
        }
        summary.total_attachments += attachments.len();

        entries.push(DownloadLogEntry {
            message_info: info,
            attachments,
        });
    }

    if request.save_log && !entries.is_empty() {
        let path = sink.log_path(&range);
        match log_file::save_download_log(&path, &entries) {
            Ok(()) => {
                log::info!("Log saved to: {}", path.display());
                summary.log_file = Some(path);
            }
            Err(e) => log::error!("Could not save log {}: {e}", path.display()),
        }
    }

    Ok(summary)
}

fn transfer_one(
    mail: &dyn MailService,
    sink: &dyn TransferSink,
    message_id: &str,
    record: &mut AttachmentRecord,
) {
    let bytes = match mail.get_attachment(message_id, &record.attachment_id) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Error downloading attachment {}: {e}", record.filename);
            return;
        }
    };

    record.destination = sink.transfer(&bytes, &record.filename, &record.mime_type);
    record.transferred = record.destination.is_some();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{Message, MessagePart, MessageRef, PartBody};
    use crate::mail::service::MessagePage;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct FakeMail {
        ids: Vec<&'static str>,
        messages: HashMap<&'static str, Message>,
        broken_attachments: Vec<&'static str>,
    }

    impl MailService for FakeMail {
        fn list_page(&self, _q: &str, _t: Option<&str>) -> Result<MessagePage> {
            Ok(MessagePage {
                messages: self
                    .ids
                    .iter()
                    .map(|id| MessageRef {
                        id: id.to_string(),
                        thread_id: None,
                    })
                    .collect(),
                next_page_token: None,
            })
        }

        fn get_message(&self, id: &str) -> Result<Message> {
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Validation(format!("no message {id}")))
        }

        fn get_attachment(&self, _m: &str, attachment_id: &str) -> Result<Vec<u8>> {
            if self.broken_attachments.iter().any(|a| *a == attachment_id) {
                return Err(Error::Decode("bad data".into()));
            }
            Ok(attachment_id.as_bytes().to_vec())
        }
    }

    /// Records transfers in memory; names listed in `reject` fail.
    #[derive(Default)]
    struct MemorySink {
        stored: RefCell<Vec<(String, Vec<u8>)>>,
        reject: Vec<&'static str>,
    }

    impl TransferSink for MemorySink {
        fn store(&self, bytes: &[u8], filename: &str, _mime: &str) -> Result<String> {
            if self.reject.iter().any(|r| *r == filename) {
                return Err(Error::Validation("rejected".into()));
            }
            self.stored
                .borrow_mut()
                .push((filename.to_string(), bytes.to_vec()));
            Ok(format!("mem://{filename}"))
        }

        fn destination(&self) -> String {
            "memory".into()
        }

        fn log_path(&self, _range: &DateRange) -> PathBuf {
            PathBuf::from("unused.json")
        }
    }

    fn pdf(name: &str, att: &str) -> MessagePart {
        MessagePart {
            filename: name.into(),
            mime_type: "application/pdf".into(),
            body: PartBody {
                attachment_id: Some(att.into()),
                size: 10,
                data: None,
            },
            ..MessagePart::default()
        }
    }

    fn message(id: &str, parts: Vec<MessagePart>) -> Message {
        Message {
            id: id.into(),
            thread_id: format!("t-{id}"),
            internal_date: None,
            payload: Some(MessagePart {
                mime_type: "multipart/mixed".into(),
                parts: Some(parts),
                ..MessagePart::default()
            }),
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            start: "2024-01-01".into(),
            end: "2024-01-31".into(),
            extra_query: String::new(),
            save_log: false,
        }
    }

    #[test]
    fn invalid_range_is_validation_error() {
        let mut req = request();
        req.start = "2024-02-01".into();
        let err = run(
            &FakeMail::default(),
            &MemorySink::default(),
            &AttachmentFilter::pdf(),
            &req,
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn no_messages_gives_zeroed_summary() {
        let summary = run(
            &FakeMail::default(),
            &MemorySink::default(),
            &AttachmentFilter::pdf(),
            &request(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(summary, RunSummary::empty("memory"));
    }

    #[test]
    fn failures_are_counted_per_attachment() {
        let mut mail = FakeMail {
            ids: vec!["m1", "gone", "m2"],
            broken_attachments: vec!["att-broken"],
            ..FakeMail::default()
        };
        mail.messages.insert(
            "m1",
            message("m1", vec![pdf("ok.pdf", "att-ok"), pdf("broken.pdf", "att-broken")]),
        );
        mail.messages
            .insert("m2", message("m2", vec![pdf("refused.pdf", "att-refused")]));
        let sink = MemorySink {
            reject: vec!["refused.pdf"],
            ..MemorySink::default()
        };

        let summary = run(
            &mail,
            &sink,
            &AttachmentFilter::pdf(),
            &request(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(summary.total_messages, 3);
        assert_eq!(summary.total_attachments, 3);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 2);
        assert_eq!(
            *sink.stored.borrow(),
            vec![("ok.pdf".to_string(), b"att-ok".to_vec())]
        );
    }

    #[test]
    fn message_without_child_parts_adds_nothing() {
        let mut mail = FakeMail {
            ids: vec!["flat"],
            ..FakeMail::default()
        };
        mail.messages.insert(
            "flat",
            Message {
                id: "flat".into(),
                payload: Some(pdf("single.pdf", "att-single")),
                ..Message::default()
            },
        );
        let summary = run(
            &mail,
            &MemorySink::default(),
            &AttachmentFilter::pdf(),
            &request(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(summary.total_messages, 1);
        assert_eq!(summary.total_attachments, 0);
    }

    #[test]
    fn raised_cancel_flag_interrupts() {
        let mut mail = FakeMail {
            ids: vec!["m1"],
            ..FakeMail::default()
        };
        mail.messages
            .insert("m1", message("m1", vec![pdf("a.pdf", "att-a")]));
        let sink = MemorySink::default();
        let err = run(
            &mail,
            &sink,
            &AttachmentFilter::pdf(),
            &request(),
            &AtomicBool::new(true),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert!(sink.stored.borrow().is_empty());
    }
}
