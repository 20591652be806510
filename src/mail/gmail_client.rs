use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::auth::Session;
use crate::domain::message::{Message, MessageRef};
use crate::error::{Error, Result};
use crate::mail::decoders::decode_base64url;
use crate::mail::service::{MailService, MessagePage};

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Largest page the list endpoint accepts.
pub const MAX_RESULTS_PER_PAGE: u32 = 500;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct AttachmentResponse {
    #[serde(default)]
    data: String,
}

/// Gmail REST v1 client for the authorized user ("me").
pub struct GmailClient {
    http: Client,
    session: Session,
    base_url: String,
}

impl GmailClient {
    pub fn new(session: Session) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            http,
            session,
            base_url: API_BASE.to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        log::debug!("GET {url} {query:?}");
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.session.access_token())
            .query(query)
            .send()?;
        Ok(check_status(resp)?.json()?)
    }
}

/// Turn a non-success response into [`Error::Api`] carrying the body text.
pub(crate) fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(Error::Api { status, body })
}

impl MailService for GmailClient {
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        let url = format!("{}/messages", self.base_url);
        let max = MAX_RESULTS_PER_PAGE.to_string();
        let mut params = vec![("q", query), ("maxResults", max.as_str())];
        if let Some(tok) = page_token {
            params.push(("pageToken", tok));
        }
        let list: ListResponse = self.get_json(&url, &params)?;
        Ok(MessagePage {
            messages: list.messages,
            next_page_token: list.next_page_token,
        })
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        let url = format!("{}/messages/{}", self.base_url, id);
        self.get_json(&url, &[("format", "full")])
    }

    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            self.base_url, message_id, attachment_id
        );
        let att: AttachmentResponse = self.get_json(&url, &[])?;
        decode_base64url(&att.data)
    }
}
