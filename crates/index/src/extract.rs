//! Plain-text extraction for uploaded documents.

use std::path::Path;

use mn_domain::error::{Error, Result};

/// Extensions the ingestion pipeline accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "pdf"];

/// Parsed document content.
#[derive(Debug)]
pub struct ExtractedDocument {
    pub content: String,
    pub file_type: String,
}

/// Whether a filename carries a supported extension. Used to reject
/// uploads before anything touches disk or the index.
pub fn is_supported_extension(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Human-readable list of supported extensions, for error messages.
pub fn supported_extensions_label() -> String {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Parse a document file into plain text, dispatching on its extension.
pub fn parse_file(path: &Path) -> Result<ExtractedDocument> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "txt" => Ok(ExtractedDocument {
            content: std::fs::read_to_string(path).map_err(Error::Io)?,
            file_type: "txt".into(),
        }),
        "md" | "markdown" => Ok(ExtractedDocument {
            content: std::fs::read_to_string(path).map_err(Error::Io)?,
            file_type: "md".into(),
        }),
        "pdf" => {
            let bytes = std::fs::read(path).map_err(Error::Io)?;
            let content = pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| Error::Document(format!("PDF parse error: {e}")))?;
            Ok(ExtractedDocument {
                content,
                file_type: "pdf".into(),
            })
        }
        other => Err(Error::Document(format!(
            "unsupported file type: .{other} (supported: {})",
            supported_extensions_label()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extension_check_is_case_insensitive() {
        assert!(is_supported_extension("notes.TXT"));
        assert!(is_supported_extension("readme.md"));
        assert!(is_supported_extension("paper.pdf"));
        assert!(!is_supported_extension("report.docx"));
        assert!(!is_supported_extension("no_extension"));
    }

    #[test]
    fn parse_txt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "plain text body").unwrap();
        let doc = parse_file(&path).unwrap();
        assert_eq!(doc.content, "plain text body");
        assert_eq!(doc.file_type, "txt");
    }

    #[test]
    fn parse_markdown_normalizes_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.markdown");
        std::fs::write(&path, "# heading").unwrap();
        let doc = parse_file(&path).unwrap();
        assert_eq!(doc.file_type, "md");
    }

    #[test]
    fn parse_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.docx");
        std::fs::write(&path, "zip bytes").unwrap();
        let err = parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }
}
