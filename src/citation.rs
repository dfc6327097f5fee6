//! How citations are labelled and opened in the references list.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Citation;

const FILEPATH_TRUNCATION_LIMIT: usize = 50;
const FILEPATH_KEEP: usize = 20;

static LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

static DOCUMENT_ID_IN_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([^/]+)/[^/]+$").expect("document id pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAction {
    OpenIdDoc,
    OpenAttachmentsIdDoc,
}

impl DocumentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentAction::OpenIdDoc => "OpenIdDoc",
            DocumentAction::OpenAttachmentsIdDoc => "OpenAttachmentsIdDoc",
        }
    }
}

/// A request for the host to open a document in its own viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    pub action: DocumentAction,
    pub id_doc: String,
}

/// Label shown for a citation in the references list. `index` is 1-based.
pub fn citation_label(citation: &Citation, index: usize, truncate: bool) -> String {
    let Some(filepath) = citation.filepath.as_deref().filter(|p| !p.is_empty()) else {
        return format!("Citation {}", index);
    };

    let part = match (citation.part_index, citation.chunk_id.as_deref()) {
        (Some(part), _) => part.to_string(),
        (None, Some(chunk)) => chunk
            .trim()
            .parse::<u64>()
            .map(|n| (n + 1).to_string())
            .unwrap_or_default(),
        (None, None) => String::new(),
    };

    let chars: Vec<char> = filepath.chars().collect();
    if truncate && chars.len() > FILEPATH_TRUNCATION_LIMIT {
        let head: String = chars[..FILEPATH_KEEP].iter().collect();
        let tail: String = chars[chars.len() - FILEPATH_KEEP..].iter().collect();
        format!("{}...{} - Part {}", head, tail, part)
    } else {
        format!("{} - Part {}", filepath, part)
    }
}

pub fn references_label(count: usize) -> String {
    if count > 1 {
        format!("{} references", count)
    } else {
        "1 reference".to_string()
    }
}

/// Decode the URL-safe base64 form the search index uses for blob URLs.
///
/// The index appends one padding digit to every value, which is dropped first.
pub fn decode_base64_url(encoded: &str) -> Option<String> {
    let mut trimmed = encoded.chars();
    trimmed.next_back()?;
    let standard: String = trimmed
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT_BASE64.decode(standard).ok()?;
    String::from_utf8(bytes).ok()
}

fn points_to_blob(url: &str) -> bool {
    url.contains("blob.core")
        || decode_base64_url(url).is_some_and(|decoded| decoded.contains("blob.core"))
}

pub fn should_display_citation_link(citation: &Citation) -> bool {
    match citation.url.as_deref() {
        Some(url) if !url.is_empty() => url.contains("iddoc_") || points_to_blob(url),
        _ => false,
    }
}

pub fn should_display_attachment_link(citation: &Citation) -> bool {
    match citation.url.as_deref() {
        Some(url) if !url.is_empty() => points_to_blob(url),
        _ => false,
    }
}

/// Work out which document a citation refers to.
///
/// `iddoc_<id>` urls carry the id directly; blob urls carry it as the parent folder of
/// the file.
pub fn document_request(citation: &Citation, action: DocumentAction) -> Option<DocumentRequest> {
    let url = citation.url.as_deref()?;

    let id_doc = if let Some(id) = url.strip_prefix("iddoc_") {
        Some(id.to_string())
    } else {
        let file_url = if url.contains("http") {
            Some(url.to_string())
        } else {
            decode_base64_url(url)
        };
        file_url.and_then(|file_url| {
            DOCUMENT_ID_IN_URL
                .captures(&file_url)
                .map(|cap| cap[1].to_string())
        })
    };

    match id_doc {
        Some(id_doc) => Some(DocumentRequest { action, id_doc }),
        None => {
            tracing::error!(url = %url, "could not find a document id in the citation url");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_url(url: &str) -> Citation {
        Citation {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn encode_like_index(plain: &str) -> String {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(plain);
        format!("{}0", encoded)
    }

    #[test]
    fn label_uses_part_index_then_chunk_id() {
        let mut citation = Citation {
            filepath: Some("guide.pdf".to_string()),
            chunk_id: Some("4".to_string()),
            ..Default::default()
        };
        assert_eq!(citation_label(&citation, 1, false), "guide.pdf - Part 5");

        citation.part_index = Some(2);
        assert_eq!(citation_label(&citation, 1, false), "guide.pdf - Part 2");
    }

    #[test]
    fn label_without_filepath_falls_back_to_index() {
        assert_eq!(citation_label(&Citation::default(), 3, true), "Citation 3");
    }

    #[test]
    fn long_paths_are_truncated_in_the_middle() {
        let path = format!("{}{}", "a".repeat(30), "b".repeat(30));
        let citation = Citation {
            filepath: Some(path.clone()),
            part_index: Some(1),
            ..Default::default()
        };

        let short = citation_label(&citation, 1, true);
        assert_eq!(short, format!("{}...{} - Part 1", "a".repeat(20), "b".repeat(20)));
        assert_eq!(citation_label(&citation, 1, false), format!("{} - Part 1", path));
    }

    #[test]
    fn references_label_pluralizes() {
        assert_eq!(references_label(1), "1 reference");
        assert_eq!(references_label(3), "3 references");
    }

    #[test]
    fn decodes_index_style_base64() {
        let encoded = encode_like_index("https://acct.blob.core.windows.net/docs/4711/file.pdf");
        assert_eq!(
            decode_base64_url(&encoded).as_deref(),
            Some("https://acct.blob.core.windows.net/docs/4711/file.pdf")
        );
        assert_eq!(decode_base64_url(""), None);
    }

    #[test]
    fn link_visibility_rules() {
        assert!(should_display_citation_link(&with_url("iddoc_42")));
        assert!(!should_display_attachment_link(&with_url("iddoc_42")));

        let blob = "https://acct.blob.core.windows.net/docs/42/a.pdf";
        assert!(should_display_citation_link(&with_url(blob)));
        assert!(should_display_attachment_link(&with_url(blob)));

        let encoded = encode_like_index(blob);
        assert!(should_display_attachment_link(&with_url(&encoded)));

        assert!(!should_display_citation_link(&with_url("https://example.com/a")));
        assert!(!should_display_citation_link(&Citation::default()));
    }

    #[test]
    fn document_ids_come_from_iddoc_prefix_or_parent_folder() {
        let request = document_request(&with_url("iddoc_42"), DocumentAction::OpenIdDoc).unwrap();
        assert_eq!(request.id_doc, "42");
        assert_eq!(request.action, DocumentAction::OpenIdDoc);

        let blob = "https://acct.blob.core.windows.net/docs/4711/file.pdf";
        let request =
            document_request(&with_url(blob), DocumentAction::OpenAttachmentsIdDoc).unwrap();
        assert_eq!(request.id_doc, "4711");

        let encoded = encode_like_index(blob);
        let request = document_request(&with_url(&encoded), DocumentAction::OpenIdDoc).unwrap();
        assert_eq!(request.id_doc, "4711");

        assert_eq!(document_request(&with_url("nothing"), DocumentAction::OpenIdDoc), None);
    }
}
