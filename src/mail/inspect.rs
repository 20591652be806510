use crate::domain::message::{Message, MessageInfo};

/// Pull the subject/from/date headers out of a fetched message. Header names
/// match case-insensitively; absent headers stay empty.
pub fn extract_info(message: &Message) -> MessageInfo {
    let mut info = MessageInfo {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        internal_date: message.internal_date.clone().unwrap_or_default(),
        ..MessageInfo::default()
    };

    let headers = message.payload.iter().flat_map(|p| p.headers.iter());
    for h in headers {
        match h.name.to_ascii_lowercase().as_str() {
            "subject" => info.subject = h.value.clone(),
            "from" => info.from = h.value.clone(),
            "date" => info.date = h.value.clone(),
            _ => {}
        }
    }

    info
}
