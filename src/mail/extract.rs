use crate::domain::message::{AttachmentRecord, MessagePart};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Document types the extractor can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AttachmentKind {
    Pdf,
    Docx,
}

impl AttachmentKind {
    fn extension(self) -> &'static str {
        match self {
            AttachmentKind::Pdf => ".pdf",
            AttachmentKind::Docx => ".docx",
        }
    }

    fn mime_type(self) -> &'static str {
        match self {
            AttachmentKind::Pdf => PDF_MIME,
            AttachmentKind::Docx => DOCX_MIME,
        }
    }
}

/// Which parts count as wanted attachments: by lowercase filename suffix or
/// by exact MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFilter {
    extensions: Vec<String>,
    mime_types: Vec<String>,
}

impl AttachmentFilter {
    pub fn from_kinds(kinds: &[AttachmentKind]) -> Self {
        let mut filter = Self {
            extensions: Vec::new(),
            mime_types: Vec::new(),
        };
        for k in kinds {
            let ext = k.extension().to_string();
            if !filter.extensions.contains(&ext) {
                filter.extensions.push(ext);
                filter.mime_types.push(k.mime_type().to_string());
            }
        }
        filter
    }

    pub fn pdf() -> Self {
        Self::from_kinds(&[AttachmentKind::Pdf])
    }

    pub fn pdf_and_docx() -> Self {
        Self::from_kinds(&[AttachmentKind::Pdf, AttachmentKind::Docx])
    }

    pub fn matches(&self, filename: &str, mime_type: &str) -> bool {
        let by_name = !filename.is_empty() && {
            let lower = filename.to_lowercase();
            self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
        };
        by_name || self.mime_types.iter().any(|m| m == mime_type)
    }
}

/// Records for every part in `parts` (and below) that passes `filter` and has
/// an attachment id, in pre-order. Children are always visited, matched
/// parent or not.
pub fn extract_matching(parts: &[MessagePart], filter: &AttachmentFilter) -> Vec<AttachmentRecord> {
    let mut out = Vec::new();
    for part in parts {
        walk(part, filter, &mut out);
    }
    out
}

fn walk(part: &MessagePart, filter: &AttachmentFilter, out: &mut Vec<AttachmentRecord>) {
    if filter.matches(&part.filename, &part.mime_type) {
        match &part.body.attachment_id {
            Some(id) => out.push(AttachmentRecord {
                filename: part.filename.clone(),
                attachment_id: id.clone(),
                size: part.body.size,
                mime_type: part.mime_type.clone(),
                transferred: false,
                destination: None,
            }),
            None => log::debug!(
                "skipping matching part '{}' without attachment id",
                part.filename
            ),
        }
    }

    if let Some(children) = &part.parts {
        for child in children {
            walk(child, filter, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::PartBody;

    fn leaf(filename: &str, mime: &str, att: Option<&str>) -> MessagePart {
        MessagePart {
            filename: filename.into(),
            mime_type: mime.into(),
            body: PartBody {
                attachment_id: att.map(str::to_string),
                size: 42,
                data: None,
            },
            ..MessagePart::default()
        }
    }

    fn container(mime: &str, parts: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: mime.into(),
            parts: Some(parts),
            ..MessagePart::default()
        }
    }

    fn ids(records: &[AttachmentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.attachment_id.as_str()).collect()
    }

    #[test]
    fn filter_matches_extension_case_insensitively_or_exact_mime() {
        let f = AttachmentFilter::pdf();
        assert!(f.matches("Report.PDF", "application/octet-stream"));
        assert!(f.matches("", PDF_MIME));
        assert!(!f.matches("notes.txt", "text/plain"));
        assert!(!f.matches("", "Application/PDF"));
        assert!(!f.matches("letter.docx", DOCX_MIME));
        assert!(AttachmentFilter::pdf_and_docx().matches("letter.docx", "application/octet-stream"));
        assert!(AttachmentFilter::pdf_and_docx().matches("", DOCX_MIME));
    }

    #[test]
    fn duplicate_kinds_collapse() {
        assert_eq!(
            AttachmentFilter::from_kinds(&[AttachmentKind::Pdf, AttachmentKind::Pdf]),
            AttachmentFilter::pdf()
        );
    }

    #[test]
    fn counts_matching_leaves_at_any_depth() {
        let parts = vec![
            leaf("", "text/plain", None),
            leaf("a.pdf", PDF_MIME, Some("1")),
            container(
                "multipart/mixed",
                vec![
                    leaf("b.pdf", PDF_MIME, Some("2")),
                    container(
                        "multipart/related",
                        vec![container(
                            "multipart/alternative",
                            vec![leaf("c.PDF", "application/octet-stream", Some("3"))],
                        )],
                    ),
                ],
            ),
            leaf("image.png", "image/png", Some("4")),
        ];
        let got = extract_matching(&parts, &AttachmentFilter::pdf());
        assert_eq!(ids(&got), vec!["1", "2", "3"]);
        assert!(got.iter().all(|r| !r.transferred && r.destination.is_none()));
    }

    #[test]
    fn matching_part_without_attachment_id_is_skipped() {
        let parts = vec![leaf("inline.pdf", PDF_MIME, None)];
        assert!(extract_matching(&parts, &AttachmentFilter::pdf()).is_empty());
    }

    #[test]
    fn order_is_preorder_and_children_of_matches_are_visited() {
        let mut parent = leaf("outer.pdf", PDF_MIME, Some("p"));
        parent.parts = Some(vec![
            leaf("inner1.pdf", PDF_MIME, Some("c1")),
            container("multipart/mixed", vec![leaf("deep.pdf", PDF_MIME, Some("c2"))]),
        ]);
        let parts = vec![parent, leaf("sibling.pdf", PDF_MIME, Some("s"))];
        let got = extract_matching(&parts, &AttachmentFilter::pdf());
        assert_eq!(ids(&got), vec!["p", "c1", "c2", "s"]);
    }

    #[test]
    fn record_copies_part_fields() {
        let parts = vec![leaf("Brief.docx", DOCX_MIME, Some("d1"))];
        let got = extract_matching(&parts, &AttachmentFilter::pdf_and_docx());
        assert_eq!(
            got,
            vec![AttachmentRecord {
                filename: "Brief.docx".into(),
                attachment_id: "d1".into(),
                size: 42,
                mime_type: DOCX_MIME.into(),
                transferred: false,
                destination: None,
            }]
        );
    }
}
