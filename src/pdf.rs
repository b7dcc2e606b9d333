//! PDF loading: scoped temporary storage plus page-level text extraction.

use lopdf::Document;
use std::io::Write;
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

/// Errors raised while loading a PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Temporary storage could not be created or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Payload is not a PDF the parser can read.
    #[error("pdf parse error: {0}")]
    Parse(String),
}

/// Text of one page, numbered from 1 in page-tree order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number.
    pub number: u32,
    /// Extracted text; empty for pages without text content.
    pub text: String,
}

/// Upload payload persisted to a temporary file for the duration of extraction.
///
/// The file is removed when the value drops, whichever way the caller exits.
pub struct ScopedUpload {
    file: NamedTempFile,
}

impl ScopedUpload {
    /// Write `bytes` to a new file in `dir` named after `upload_id`.
    pub fn create(dir: &Path, upload_id: &str, bytes: &[u8]) -> Result<Self, PdfError> {
        let prefix = format!("temp_{upload_id}");
        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(".pdf")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Load a PDF from disk and return one entry per page.
///
/// Pages whose text cannot be decoded are kept with empty text so that the page count always
/// matches the document's page tree.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, PdfError> {
    let document = Document::load(path).map_err(|error| PdfError::Parse(error.to_string()))?;

    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(PdfError::Parse(format!(
            "pdf has no pages: {}",
            path.display()
        )));
    }

    let mut extracted = Vec::with_capacity(pages.len());
    for page_no in pages.keys() {
        let text = match document.extract_text(&[*page_no]) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(page = page_no, error = %error, "Page text could not be decoded");
                String::new()
            }
        };
        extracted.push(PageText {
            number: *page_no,
            text,
        });
    }

    Ok(extracted)
}

/// Persist `bytes` to scoped storage in `dir` and extract its pages.
pub fn load_pdf(dir: &Path, upload_id: &str, bytes: &[u8]) -> Result<Vec<PageText>, PdfError> {
    let upload = ScopedUpload::create(dir, upload_id, bytes)?;
    tracing::debug!(path = %upload.path().display(), bytes = bytes.len(), "Upload staged");
    extract_pages(upload.path())
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build an in-memory PDF with one page per entry in `pages`.
    pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize pdf");
        bytes
    }
}
