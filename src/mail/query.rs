use crate::domain::range::DateRange;

const QUERY_DATE_FORMAT: &str = "%Y/%m/%d";

/// Gmail search expression for attachments in `range`, with `extra` appended
/// verbatim when non-empty.
pub fn build_query(range: &DateRange, extra: &str) -> String {
    let mut parts = vec![
        "has:attachment".to_string(),
        format!("after:{}", range.start().format(QUERY_DATE_FORMAT)),
        format!("before:{}", range.end().format(QUERY_DATE_FORMAT)),
    ];

    if !extra.trim().is_empty() {
        parts.push(extra.to_string());
    }

    parts.join(" ")
}
