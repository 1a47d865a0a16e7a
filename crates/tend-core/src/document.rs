//! On-disk note document format.
//!
//! A note file is a YAML metadata header between `---` delimiters followed by
//! the free-text body. The header's field set is additive-only: fields the
//! engine owns are typed below, everything else round-trips through `extra`
//! untouched. The body is preserved byte-for-byte.
//!
//! ```text
//! ---
//! status: inbox
//! type: literature
//! quality_score: 0.85
//! ---
//! The body, owned by the author.
//! ```

use crate::types::{NoteId, NoteRecord, NoteStatus, NoteType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const DELIMITER: &str = "---";

/// Failure to parse or render a note document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// A header opener without a closing `---` line.
    #[error("metadata header opened but never closed")]
    UnterminatedHeader,

    #[error("metadata header is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Serialized shape of the metadata header. Unknown keys are flattened into
/// `extra` and written back verbatim.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    #[serde(default)]
    status: NoteStatus,
    #[serde(rename = "type", default)]
    note_type: NoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promoted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Codec between file content and [`NoteRecord`].
pub struct NoteDocument;

impl NoteDocument {
    /// Parse file content into a record. A file with no header is a bare
    /// capture: default metadata, the whole content as body.
    pub fn parse(id: NoteId, content: &str) -> Result<NoteRecord, DocumentError> {
        let Some((header_src, body)) = split_header(content)? else {
            let mut record = NoteRecord::new(id, content);
            record.created_at = None;
            return Ok(record);
        };

        let header: Header = serde_yaml::from_str(header_src)?;
        Ok(NoteRecord {
            id,
            status: header.status,
            note_type: header.note_type,
            quality_score: header.quality_score,
            tags: header.tags,
            created_at: header.created_at,
            promoted_at: header.promoted_at,
            processed_at: header.processed_at,
            extra: header.extra,
            body: body.to_string(),
        })
    }

    /// Render a record back to file content.
    pub fn render(record: &NoteRecord) -> Result<String, DocumentError> {
        let header = Header {
            status: record.status,
            note_type: record.note_type,
            quality_score: record.quality_score,
            tags: record.tags.clone(),
            created_at: record.created_at,
            promoted_at: record.promoted_at,
            processed_at: record.processed_at,
            extra: record.extra.clone(),
        };
        let yaml = serde_yaml::to_string(&header)?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", record.body))
    }
}

/// Split content into (header yaml, body) if a header is present. The body
/// starts immediately after the closing delimiter's newline. A file that
/// opens a header but never closes it is malformed.
fn split_header(content: &str) -> Result<Option<(&str, &str)>, DocumentError> {
    let Some(rest) = content.strip_prefix(DELIMITER) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return Ok(None);
    };

    for (offset, line) in line_offsets(rest) {
        if line.trim_end_matches('\r') == DELIMITER {
            let header = &rest[..offset];
            let body_start = offset + line.len();
            let body = rest[body_start..].strip_prefix('\n').unwrap_or("");
            return Ok(Some((header, body)));
        }
    }
    Err(DocumentError::UnterminatedHeader)
}

/// Iterate lines with their byte offsets, excluding the trailing newline from
/// each yielded line.
fn line_offsets(s: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    s.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.trim_end_matches('\n'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\n\
        status: inbox\n\
        type: literature\n\
        quality_score: 0.85\n\
        source_url: https://example.org/paper\n\
        ---\n\
        # Reading notes\n\nBody line.\n";

    #[test]
    fn parses_header_and_body() {
        let record = NoteDocument::parse(NoteId::from("paper"), DOC).unwrap();

        assert_eq!(record.status, NoteStatus::Inbox);
        assert_eq!(record.note_type, NoteType::Literature);
        assert_eq!(record.quality_score, Some(0.85));
        assert_eq!(record.body, "# Reading notes\n\nBody line.\n");
        assert_eq!(
            record.extra.get("source_url"),
            Some(&serde_yaml::Value::String(
                "https://example.org/paper".into()
            ))
        );
    }

    #[test]
    fn headerless_file_is_a_bare_capture() {
        let record = NoteDocument::parse(NoteId::from("scratch"), "just text\n").unwrap();

        assert_eq!(record.status, NoteStatus::Inbox);
        assert_eq!(record.note_type, NoteType::Unknown);
        assert_eq!(record.body, "just text\n");
    }

    #[test]
    fn unterminated_header_is_an_error() {
        let err = NoteDocument::parse(NoteId::from("broken"), "---\nstatus: inbox\n").unwrap_err();
        assert!(matches!(err, DocumentError::UnterminatedHeader));
    }

    #[test]
    fn round_trip_preserves_body_and_extra_fields() {
        let record = NoteDocument::parse(NoteId::from("paper"), DOC).unwrap();
        let rendered = NoteDocument::render(&record).unwrap();
        let reparsed = NoteDocument::parse(NoteId::from("paper"), &rendered).unwrap();

        assert_eq!(reparsed.body, record.body);
        assert_eq!(reparsed.extra, record.extra);
        assert_eq!(reparsed.status, record.status);
        assert_eq!(reparsed.quality_score, record.quality_score);
    }

    #[test]
    fn render_omits_unset_optional_fields() {
        let record = NoteRecord::new(NoteId::from("n"), "body\n");
        let rendered = NoteDocument::render(&record).unwrap();

        assert!(!rendered.contains("quality_score"));
        assert!(!rendered.contains("promoted_at"));
        assert!(rendered.ends_with("---\nbody\n"));
    }

    #[test]
    fn extra_fields_survive_a_status_rewrite() {
        let mut record = NoteDocument::parse(NoteId::from("paper"), DOC).unwrap();
        record.status = NoteStatus::Promoted;

        let rendered = NoteDocument::render(&record).unwrap();
        assert!(rendered.contains("status: promoted"));
        assert!(rendered.contains("source_url: https://example.org/paper"));
    }
}
