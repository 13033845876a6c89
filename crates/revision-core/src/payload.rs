//! Editor-facing surface: the per-view JSON payload and the save-failure
//! redirect target.

use serde::Serialize;

use crate::revisions::Revision;
use crate::tracked::TrackedFile;

/// Everything the editor view needs in one JSON-serializable blob.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorPayload {
    pub file_id: String,
    pub revision_count: usize,
    pub revisions_list_html: String,
    pub draft_content: Option<String>,
    pub error_line: Option<u32>,
    pub error_message: Option<String>,
}

/// Syntax error carried back into the editor view after a failed save.
#[derive(Debug, Clone)]
pub struct SyntaxNotice {
    pub line: Option<u32>,
    pub message: String,
}

/// Render the revision history as a minimal HTML list, newest first.
pub fn render_revisions_list(history: &[Revision]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"code-revisions\">");
    for revision in history {
        html.push_str(&format!(
            "<li data-revision=\"{}\"><time>{}</time> by {}</li>",
            revision.id.0,
            revision.created_at,
            escape_html(&revision.author)
        ));
    }
    html.push_str("</ul>");
    html
}

/// Redirect target for a failed save: back to the editor with the error
/// location in the query string. All values URL-encoded, line numeric.
pub fn save_failure_redirect(tracked: &TrackedFile, line: Option<u32>, message: &str) -> String {
    let kind = tracked.kind.as_str();
    format!(
        "{kind}-editor.php?file={}&{kind}={}&syntax_error={}&error_message={}",
        urlencoding::encode(&tracked.relative_path),
        urlencoding::encode(&tracked.package),
        line.unwrap_or(0),
        urlencoding::encode(message),
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::fingerprint;
    use crate::tracked::FileKind;
    use versioned_store::VersionId;

    fn revision(id: u64, created_at: u64, author: &str) -> Revision {
        Revision {
            id: VersionId(id),
            content: b"x".to_vec(),
            checksum: fingerprint(b"x"),
            created_at,
            author: author.to_string(),
        }
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_revisions_list(&[]), "");
    }

    #[test]
    fn test_render_escapes_author() {
        let html = render_revisions_list(&[revision(7, 1700000000, "<script>")]);
        assert!(html.contains("data-revision=\"7\""));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_save_failure_redirect_encodes_values() {
        let tracked = TrackedFile::new(FileKind::Theme, "twenty thirteen", "inc/custom header.php");
        let url = save_failure_redirect(&tracked, Some(3), "unexpected end of file");

        assert!(url.starts_with("theme-editor.php?"));
        assert!(url.contains("file=inc%2Fcustom%20header.php"));
        assert!(url.contains("theme=twenty%20thirteen"));
        assert!(url.contains("syntax_error=3"));
        assert!(url.contains("error_message=unexpected%20end%20of%20file"));
    }

    #[test]
    fn test_save_failure_redirect_defaults_line_to_zero() {
        let tracked = TrackedFile::new(FileKind::Plugin, "hello/hello.php", "hello/hello.php");
        let url = save_failure_redirect(&tracked, None, "oops");
        assert!(url.contains("syntax_error=0"));
        assert!(url.contains("plugin=hello%2Fhello.php"));
    }

    #[test]
    fn test_payload_serializes_camel_case() {
        let payload = EditorPayload {
            file_id: "hello-php".into(),
            revision_count: 2,
            revisions_list_html: "<ul></ul>".into(),
            draft_content: None,
            error_line: Some(1),
            error_message: Some("bad".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["fileId"], "hello-php");
        assert_eq!(json["revisionCount"], 2);
        assert_eq!(json["errorLine"], 1);
        assert!(json.get("revisionsListHtml").is_some());
        assert!(json.get("draftContent").is_some());
    }
}
