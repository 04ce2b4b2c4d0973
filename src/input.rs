//! User input: free-form text plus attached files.
//!
//! Files are validated against the accepted content-type set before anything
//! else happens to them, sniffed for their real type, and — for images —
//! given a local preview file whose lifetime is tied to the entry itself, so
//! the preview is released on removal, on reset, and on every error path.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ClipError, Result};
use crate::extract::{MIME_DOCX, MIME_PDF, MIME_PPTX, MIME_XLSX};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";

/// Content types accepted for processing. Everything else is rejected with a
/// validation error before submission.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    MIME_TEXT,
    MIME_MARKDOWN,
    MIME_PNG,
    MIME_JPEG,
    MIME_PDF,
    MIME_DOCX,
    MIME_XLSX,
    MIME_PPTX,
];

/// Local preview resource for an image file.
///
/// Owns a named temp file holding the image bytes; dropping the preview
/// deletes the file. Held inside [`InputFile`] so release is guaranteed on
/// every exit path.
#[derive(Debug)]
pub struct Preview {
    file: tempfile::NamedTempFile,
}

impl Preview {
    fn create(bytes: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// One attached file, with its uploaded public URL once available.
#[derive(Debug)]
pub struct InputFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub public_url: Option<String>,
    pub preview: Option<Preview>,
}

impl InputFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// The full user input for one clipping session.
#[derive(Debug, Default)]
pub struct InputBundle {
    pub text: String,
    pub files: Vec<InputFile>,
}

impl InputBundle {
    /// Add a batch of files.
    ///
    /// Accepted files are appended in the given order; rejected files are
    /// reported together in one validation error listing their names. A batch
    /// with rejects still adds its accepted members first.
    pub fn add_files(&mut self, incoming: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut rejected = Vec::new();
        for (name, bytes) in incoming {
            let content_type = detect_content_type(&name, &bytes);
            if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
                rejected.push(name);
                continue;
            }
            let preview = if content_type.starts_with("image/") {
                match Preview::create(&bytes) {
                    Ok(p) => Some(p),
                    Err(e) => {
                        tracing::warn!(file = %name, error = %e, "could not create preview file");
                        None
                    }
                }
            } else {
                None
            };
            self.files.push(InputFile {
                name,
                content_type,
                bytes,
                public_url: None,
                preview,
            });
        }

        if !rejected.is_empty() {
            return Err(ClipError::Validation(format!(
                "Unsupported file type(s): {}. Please upload only supported file types.",
                rejected.join(", ")
            )));
        }
        Ok(())
    }

    /// Read files from disk and add them as one batch.
    pub fn add_paths(&mut self, paths: &[PathBuf]) -> Result<()> {
        let mut incoming = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = std::fs::read(path).map_err(|e| {
                ClipError::Validation(format!("Could not read {}: {}", path.display(), e))
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            incoming.push((name, bytes));
        }
        self.add_files(incoming)
    }

    /// Remove the file at `index`. Its preview resource is released.
    pub fn remove_file(&mut self, index: usize) {
        if index < self.files.len() {
            self.files.remove(index);
        }
    }

    /// Clear text and all files, releasing every preview resource.
    pub fn reset(&mut self) {
        self.text.clear();
        self.files.clear();
    }
}

/// Determine a file's content type: byte sniffing first, then the extension
/// for the plain-text kinds sniffing cannot see.
pub fn detect_content_type(name: &str, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    let extension = name.rsplit('.').next().unwrap_or_default().to_lowercase();
    match extension.as_str() {
        "txt" => MIME_TEXT.to_string(),
        "md" | "markdown" => MIME_MARKDOWN.to_string(),
        _ => "application/octet-stream".to_string(),
    }
}
