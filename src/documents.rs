use std::path::Path;

use crate::error::{ChatError, Result};

pub const PDF_MIME: &str = "application/pdf";

/// An uploaded document. Only the name is kept; content is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub mime: &'static str,
}

/// MIME type from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => PDF_MIME,
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Documents listed in the sidebar, in upload order.
#[derive(Debug, Clone)]
pub struct DocumentLibrary {
    documents: Vec<Document>,
}

impl Default for DocumentLibrary {
    fn default() -> Self {
        Self::seeded()
    }
}

impl DocumentLibrary {
    #[cfg(test)]
    pub fn empty() -> Self {
        Self { documents: Vec::new() }
    }

    /// The starting list shown on first launch.
    pub fn seeded() -> Self {
        Self {
            documents: ["Documentation.pdf", "User Guide.pdf"]
                .into_iter()
                .map(|name| Document {
                    name: name.to_string(),
                    mime: PDF_MIME,
                })
                .collect(),
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Register one file by name. Only PDFs are accepted.
    pub fn upload(&mut self, path: &Path) -> Result<&Document> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ChatError::UploadRejected {
                name: path.display().to_string(),
                mime: "no file name".to_string(),
            })?;

        let mime = mime_for(path);
        if mime != PDF_MIME {
            tracing::info!(%name, mime, "upload rejected");
            return Err(ChatError::UploadRejected {
                name,
                mime: mime.to_string(),
            });
        }

        tracing::info!(%name, "document registered");
        self.documents.push(Document { name, mime });
        Ok(&self.documents[self.documents.len() - 1])
    }
}
