use crate::domain::message::{Message, MessageRef};
use crate::error::Result;

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
}

/// The mail provider operations a run needs.
pub trait MailService {
    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage>;
    fn get_message(&self, id: &str) -> Result<Message>;
    fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;
}
