// Reference documents handed to the model as evidence

use std::fmt;
use std::path::Path;

use crate::backend::Part;

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// Text-like content inlined into the prompt.
    Text(String),
    /// Binary content (PDF, images, workbooks) sent as inline data.
    Inline(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDocument {
    pub name: String,
    pub mime_type: String,
    pub body: DocumentBody,
}

#[derive(Debug)]
pub struct DocumentError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for DocumentError {}

const TABULAR_MIME_TYPES: &[&str] = &[
    "text/csv",
    "text/tab-separated-values",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.spreadsheet",
];

impl ReferenceDocument {
    pub fn text(name: impl Into<String>, mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), body: DocumentBody::Text(text.into()) }
    }

    pub fn inline(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), body: DocumentBody::Inline(data) }
    }

    /// Read a file, guessing its mime type from the extension. Text-like
    /// files that decode as UTF-8 are inlined as text.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|e| DocumentError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_for(&name);

        if is_text_mime(mime_type) {
            if let Ok(text) = std::str::from_utf8(&bytes) {
                return Ok(Self::text(name, mime_type, text));
            }
        }
        Ok(Self::inline(name, mime_type, bytes))
    }

    /// Spreadsheet-like documents cite cell locations rather than quotes.
    pub fn is_tabular(&self) -> bool {
        TABULAR_MIME_TYPES.contains(&self.mime_type.as_str())
    }

    /// Prompt parts for this document: a header line plus its content.
    pub fn to_parts(&self) -> Vec<Part> {
        match &self.body {
            DocumentBody::Text(text) => vec![Part::Text(format!(
                "--- Reference file: {} ({}) ---\n{}",
                self.name, self.mime_type, text
            ))],
            DocumentBody::Inline(data) => vec![
                Part::Text(format!("--- Reference file: {} ({}) ---", self.name, self.mime_type)),
                Part::InlineData { mime_type: self.mime_type.clone(), data: data.clone() },
            ],
        }
    }
}

/// Mime type from file extension; `application/octet-stream` when unknown.
pub fn mime_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "csv" => "text/csv",
        "tsv" | "tab" => "text/tab-separated-values",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/") || mime == "application/json"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("bom.CSV"), "text/csv");
        assert_eq!(mime_for("datasheet.pdf"), "application/pdf");
        assert_eq!(mime_for("Makefile"), "application/octet-stream");
    }

    #[test]
    fn test_from_path_text_and_binary() {
        let dir = tempfile::tempdir().unwrap();

        let csv = dir.path().join("parts.csv");
        std::fs::write(&csv, "Part,Qty\nR1,4\n").unwrap();
        let doc = ReferenceDocument::from_path(&csv).unwrap();
        assert_eq!(doc.name, "parts.csv");
        assert!(doc.is_tabular());
        assert_eq!(doc.body, DocumentBody::Text("Part,Qty\nR1,4\n".to_string()));

        let pdf = dir.path().join("sheet.pdf");
        let mut f = std::fs::File::create(&pdf).unwrap();
        f.write_all(&[0x25, 0x50, 0x44, 0x46, 0xff]).unwrap();
        let doc = ReferenceDocument::from_path(&pdf).unwrap();
        assert!(!doc.is_tabular());
        assert!(matches!(doc.body, DocumentBody::Inline(ref b) if b.len() == 5));
        assert_eq!(doc.to_parts().len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = ReferenceDocument::from_path(Path::new("/nonexistent/x.pdf")).unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/x.pdf"));
    }
}
