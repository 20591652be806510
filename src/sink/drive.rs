use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::Session;
use crate::domain::range::DateRange;
use crate::error::Result;
use crate::mail::gmail_client::check_status;
use crate::sink::TransferSink;

const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// Uploads attachments into one fixed Google Drive folder.
pub struct DriveSink {
    http: Client,
    session: Session,
    folder_id: String,
    upload_url: String,
}

impl DriveSink {
    pub fn new(session: Session, folder_id: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self {
            http,
            session,
            folder_id: folder_id.into(),
            upload_url: UPLOAD_URL.to_string(),
        })
    }
}

fn new_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("gmail_attachments_{nanos:x}")
}

/// `multipart/related` body: JSON metadata part followed by the media part.
fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    bytes: &[u8],
    mime_type: &str,
) -> Vec<u8> {
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

impl TransferSink for DriveSink {
    fn store(&self, bytes: &[u8], filename: &str, mime_type: &str) -> Result<String> {
        let metadata = json!({
            "name": filename,
            "parents": [self.folder_id],
        });
        let boundary = new_boundary();
        let body = multipart_related_body(&boundary, &metadata, bytes, mime_type);

        log::debug!("POST {} ({} bytes)", self.upload_url, body.len());
        let resp = self
            .http
            .post(&self.upload_url)
            .bearer_auth(self.session.access_token())
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()?;

        let uploaded: UploadResponse = check_status(resp)?.json()?;
        log::info!("Uploaded: {filename} ({} bytes) -> {}", bytes.len(), uploaded.id);
        Ok(uploaded.id)
    }

    fn destination(&self) -> String {
        format!("Google Drive folder {}", self.folder_id)
    }

    fn log_path(&self, range: &DateRange) -> PathBuf {
        PathBuf::from(format!(
            "drive_upload_log_{}_to_{}.json",
            range.start(),
            range.end()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_has_metadata_then_media() {
        let meta = json!({"name": "a.pdf", "parents": ["folder"]});
        let body = multipart_related_body("XYZ", &meta, b"%PDF-1.7", "application/pdf");
        let text = String::from_utf8(body).unwrap();

        let meta_at = text.find("\"name\":\"a.pdf\"").unwrap();
        let media_at = text.find("%PDF-1.7").unwrap();
        assert!(text.starts_with("--XYZ\r\nContent-Type: application/json"));
        assert!(text.contains("--XYZ\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.7"));
        assert!(meta_at < media_at);
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
    }

    #[test]
    fn empty_mime_falls_back_to_octet_stream() {
        let body = multipart_related_body("B", &json!({}), b"x", "");
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("Content-Type: application/octet-stream"));
    }

    #[test]
    fn log_file_is_date_stamped() {
        let sink = DriveSink::new(Session::new("t"), "folder123").unwrap();
        let r = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(
            sink.log_path(&r),
            PathBuf::from("drive_upload_log_2024-01-01_to_2024-01-31.json")
        );
        assert_eq!(sink.destination(), "Google Drive folder folder123");
    }
}
