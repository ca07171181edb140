//! Plain-text extraction from uploaded PDF documents.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text of a single page, or why that page could not be read.
pub type PageText = Result<String, String>;

/// Splits a document into per-page text.
///
/// An `Err` from `read_pages` means the document as a whole is unreadable; a
/// per-page `Err` only loses that page.
pub trait PageReader: Send + Sync {
    fn read_pages(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<Vec<PageText>, String>>;
}

/// `pdf-extract` backed reader. Parsing runs on the blocking pool. Each page is
/// rendered on its own, so a page that errors or panics the parser only loses
/// that page.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageReader;

#[cfg(feature = "pdf")]
impl PageReader for PdfPageReader {
    fn read_pages(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<Vec<PageText>, String>> {
        Box::pin(async move {
            tokio::task::spawn_blocking(move || pdf_pages(&bytes))
                .await
                .map_err(|e| {
                    if e.is_panic() {
                        "PDF parser panicked".to_owned()
                    } else {
                        e.to_string()
                    }
                })?
        })
    }
}

#[cfg(feature = "pdf")]
fn pdf_pages(bytes: &[u8]) -> Result<Vec<PageText>, String> {
    let mut doc = pdf_extract::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| e.to_string())?;
    }
    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    Ok(page_numbers
        .into_iter()
        .map(|page| pdf_page(&doc, page))
        .collect())
}

#[cfg(feature = "pdf")]
fn pdf_page(doc: &pdf_extract::Document, page: u32) -> PageText {
    let rendered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut text = String::new();
        {
            let mut output = pdf_extract::PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(doc, &mut output, page)?;
        }
        Ok::<_, pdf_extract::OutputError>(text)
    }));
    match rendered {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(format!("page {page}: {e}")),
        Err(_) => Err(format!("page {page}: PDF parser panicked")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub pages: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    fn failed(pages: u32, cause: &str) -> Self {
        Self {
            text: String::new(),
            pages,
            success: false,
            error: Some(format!("Failed to extract text from PDF: {cause}")),
        }
    }
}

#[derive(Clone)]
pub struct Extractor {
    reader: Arc<dyn PageReader>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").finish_non_exhaustive()
    }
}

#[cfg(feature = "pdf")]
impl Default for Extractor {
    fn default() -> Self {
        Self::new(Arc::new(PdfPageReader))
    }
}

impl Extractor {
    #[must_use]
    pub fn new(reader: Arc<dyn PageReader>) -> Self {
        Self { reader }
    }

    /// Extract the text of every readable page, joined by blank lines.
    ///
    /// Unreadable or blank pages are skipped with a warning. The result is a
    /// failure only when the document cannot be opened or no page yields text.
    pub async fn extract(&self, bytes: Vec<u8>) -> ExtractionResult {
        let pages = match self.reader.read_pages(bytes).await {
            Ok(pages) => pages,
            Err(cause) => {
                tracing::warn!("document could not be parsed: {cause}");
                return ExtractionResult::failed(0, &cause);
            }
        };
        let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);

        let mut texts = Vec::with_capacity(pages.len());
        for (index, page) in pages.into_iter().enumerate() {
            match page {
                Ok(text) if text.trim().is_empty() => {
                    tracing::debug!(page = index + 1, "skipping blank page");
                }
                Ok(text) => texts.push(text),
                Err(cause) => {
                    tracing::warn!(page = index + 1, "skipping unreadable page: {cause}");
                }
            }
        }

        let text = texts.join("\n\n");
        if text.trim().is_empty() {
            return ExtractionResult::failed(page_count, "no extractable text found");
        }

        ExtractionResult {
            text,
            pages: page_count,
            success: true,
            error: None,
        }
    }
}

/// Whether `text` carries at least `min_chars` characters once surrounding
/// whitespace is removed.
#[must_use]
pub fn validate_content(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() >= min_chars
}


#[cfg(test)]
mod tests {
    use super::testing::{StaticPages, Unreadable};
    use super::*;

    fn extractor(reader: impl PageReader + 'static) -> Extractor {
        Extractor::new(Arc::new(reader))
    }

    #[tokio::test]
    async fn joins_pages_with_blank_line() {
        let result = extractor(StaticPages::text(&["Page one.", "Page two."]))
            .extract(Vec::new())
            .await;
        assert!(result.success);
        assert_eq!(result.pages, 2);
        assert_eq!(result.text, "Page one.\n\nPage two.");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn bad_and_blank_pages_are_skipped() {
        let reader = StaticPages(vec![
            Ok("Intro".into()),
            Err("broken content stream".into()),
            Ok("   \n".into()),
            Ok("Dosage table".into()),
        ]);
        let result = extractor(reader).extract(Vec::new()).await;
        assert!(result.success);
        assert_eq!(result.pages, 4);
        assert_eq!(result.text, "Intro\n\nDosage table");
    }

    #[tokio::test]
    async fn all_blank_is_failure() {
        let result = extractor(StaticPages::text(&["", "  "]))
            .extract(Vec::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.pages, 2);
        assert!(
            result
                .error
                .as_deref()
                .unwrap()
                .starts_with("Failed to extract text from PDF: ")
        );
    }

    #[tokio::test]
    async fn unreadable_document_reports_cause() {
        let result = extractor(Unreadable("invalid file header"))
            .extract(Vec::new())
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Failed to extract text from PDF: invalid file header")
        );
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn garbage_bytes_fail_without_panicking() {
        let result = Extractor::default()
            .extract(b"definitely not a pdf".to_vec())
            .await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    /// Two pages sharing one font. The second page has no `MediaBox`, which
    /// makes the page renderer panic.
    #[cfg(feature = "pdf")]
    fn pdf_with_broken_second_page() -> Vec<u8> {
        use pdf_extract::{Dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", "Font");
        font.set("Subtype", "Type1");
        font.set("BaseFont", "Helvetica");
        let font_id = doc.add_object(font);
        let mut fonts = Dictionary::new();
        fonts.set("F1", font_id);
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for (text, media_box) in [("Sepsis screening protocol", true), ("lost page", false)] {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let mut page = Dictionary::new();
            page.set("Type", "Page");
            page.set("Parent", pages_id);
            page.set("Contents", content_id);
            page.set("Resources", resources_id);
            if media_box {
                let letter: Vec<Object> =
                    [0, 0, 612, 792].into_iter().map(Object::Integer).collect();
                page.set("MediaBox", letter);
            }
            kids.push(Object::from(doc.add_object(page)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", "Pages");
        pages.set("Count", i64::try_from(kids.len()).unwrap());
        pages.set("Kids", kids);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", "Catalog");
        catalog.set("Pages", pages_id);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn pdf_reader_isolates_a_broken_page() {
        let pages = PdfPageReader
            .read_pages(pdf_with_broken_second_page())
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].as_ref().unwrap().contains("Sepsis"));
        assert!(pages[1].as_ref().unwrap_err().starts_with("page 2: "));
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn broken_page_does_not_reject_the_document() {
        let result = Extractor::default()
            .extract(pdf_with_broken_second_page())
            .await;
        assert!(result.success);
        assert_eq!(result.pages, 2);
        assert!(result.text.contains("Sepsis"));
        assert!(!result.text.contains("lost"));
    }

    #[test]
    fn validation_boundary_is_inclusive() {
        assert!(!validate_content(&"a".repeat(49), 50));
        assert!(validate_content(&"a".repeat(50), 50));
        assert!(!validate_content(&format!("  {}  \n", "a".repeat(49)), 50));
    }

    #[test]
    fn validation_counts_characters_not_bytes() {
        assert!(validate_content(&"é".repeat(50), 50));
        assert!(!validate_content(&"é".repeat(25), 50));
    }
}
