//! Text extraction with page-offset tracking

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Error, Result};
use crate::types::FileType;

/// Character span of one page inside the extracted text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Char offset of the first character of the page
    pub char_start: usize,
    /// Char offset just past the last character of the page
    pub char_end: usize,
}

impl PageSpan {
    /// Whether `offset` falls inside `[char_start, char_end]`
    pub fn contains(&self, offset: usize) -> bool {
        self.char_start <= offset && offset <= self.char_end
    }
}

/// Normalized text plus its page map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    /// Ordered by page number
    pub pages: Vec<PageSpan>,
}

impl ExtractedText {
    /// Single page spanning the whole text
    pub fn single_page(text: String) -> Self {
        let len = text.chars().count();
        Self {
            text,
            pages: vec![PageSpan {
                page_number: 1,
                char_start: 0,
                char_end: len,
            }],
        }
    }

    /// Length of the text in chars
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Page containing `offset`, or page 1 when none matches
    pub fn page_for_offset(&self, offset: usize) -> u32 {
        self.pages
            .iter()
            .find(|p| p.contains(offset))
            .map(|p| p.page_number)
            .unwrap_or(1)
    }
}

/// Cleaned text of one PDF page; an error or a parser panic yields empty text
fn page_text_or_empty<F>(filename: &str, page_number: u32, extract: F) -> String
where
    F: FnOnce() -> lopdf::Result<String>,
{
    match catch_unwind(AssertUnwindSafe(extract)) {
        Ok(Ok(raw)) => cleanup_pdf_text(&raw),
        Ok(Err(e)) => {
            tracing::warn!("Skipping unreadable page {} of {}: {}", page_number, filename, e);
            String::new()
        }
        Err(_) => {
            tracing::warn!("Skipping page {} of {}: parser panicked", page_number, filename);
            String::new()
        }
    }
}

/// Replace PDF glyph artifacts that break tokenization
fn cleanup_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => {}
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => out.push(' '),
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{2010}' | '\u{2011}' => out.push('-'),
            _ => out.push(c),
        }
    }
    out
}

/// Format-dispatching text extractor
pub struct FileParser;

impl FileParser {
    /// Extract text from raw bytes of the given format
    pub fn extract(file_type: FileType, filename: &str, data: &[u8]) -> Result<ExtractedText> {
        let extracted = match file_type {
            FileType::Pdf => Self::extract_pdf(filename, data)?,
            FileType::Docx => Self::extract_docx(filename, data)?,
            FileType::Txt | FileType::Doc => Self::extract_plain(data),
        };

        if extracted.is_blank() {
            return Err(Error::extraction(filename, "no extractable text"));
        }

        tracing::debug!(
            "Extracted {} chars over {} page(s) from {}",
            extracted.char_len(),
            extracted.pages.len(),
            filename
        );
        Ok(extracted)
    }

    /// Plain text and legacy .doc are decoded as lossy UTF-8
    fn extract_plain(data: &[u8]) -> ExtractedText {
        ExtractedText::single_page(String::from_utf8_lossy(data).into_owned())
    }

    fn extract_pdf(filename: &str, data: &[u8]) -> Result<ExtractedText> {
        // lopdf can panic on malformed input, both while loading and per page
        let doc = catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(data)))
            .map_err(|_| {
                tracing::error!("PDF parser panicked while loading {}", filename);
                Error::extraction(filename, "PDF parser crashed")
            })?
            .map_err(|e| Error::extraction(filename, format!("Failed to load PDF: {}", e)))?;

        Ok(Self::extract_pdf_pages(filename, &doc))
    }

    fn extract_pdf_pages(filename: &str, doc: &lopdf::Document) -> ExtractedText {
        let mut text = String::new();
        let mut char_len = 0usize;
        let mut pages = Vec::new();

        for (page_number, _) in doc.get_pages() {
            let page_text =
                page_text_or_empty(filename, page_number, || doc.extract_text(&[page_number]));

            let start = char_len;
            let page_chars = page_text.chars().count();
            text.push_str(&page_text);
            char_len += page_chars;

            pages.push(PageSpan {
                page_number,
                char_start: start,
                char_end: start + page_chars,
            });

            text.push('\n');
            char_len += 1;
        }

        ExtractedText { text, pages }
    }

    fn extract_docx(filename: &str, data: &[u8]) -> Result<ExtractedText> {
        let docx = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(filename, format!("Failed to read DOCX: {}", e)))?;

        let mut paragraphs = Vec::new();
        for child in docx.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut para = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                para.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(para);
            }
        }

        Ok(ExtractedText::single_page(paragraphs.join("\n")))
    }
}
