use crate::domain::message::{Message, MessageRef};
use crate::mail::service::MailService;

/// Every message matching `query`, across all pages, in provider order.
///
/// A failed page aborts the whole search and yields nothing: a partial list
/// would make the run silently under-report.
pub fn list_messages_with_attachments(svc: &dyn MailService, query: &str) -> Vec<MessageRef> {
    let mut messages = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        match svc.list_page(query, page_token.as_deref()) {
            Ok(page) => {
                messages.extend(page.messages);
                match page.next_page_token {
                    Some(tok) if !tok.is_empty() => page_token = Some(tok),
                    _ => break,
                }
            }
            Err(e) => {
                log::error!("An error occurred during search: {e}");
                return Vec::new();
            }
        }
    }

    log::info!("Found {} messages with attachments", messages.len());
    messages
}

/// Full message, or `None` (logged) if it could not be fetched.
pub fn fetch_message(svc: &dyn MailService, id: &str) -> Option<Message> {
    match svc.get_message(id) {
        Ok(m) => Some(m),
        Err(e) => {
            log::warn!("Error getting message {id}: {e}");
            None
        }
    }
}
