use lopdf::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("could not read PDF: {0}")]
    Unreadable(String),

    #[error("PDF contains no extractable text")]
    Empty,

    #[error("document is too long: ~{tokens} tokens (limit {limit})")]
    TooLong { tokens: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub token_count: usize,
}

/// Rough token count at four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Extracts the text of every page and enforces the token limit.
pub fn extract_text(bytes: &[u8], max_tokens: usize) -> Result<ExtractedText, PdfError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Unreadable(e.to_string()))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(PdfError::Empty);
    }

    let text = doc
        .extract_text(&pages)
        .map_err(|e| PdfError::Unreadable(e.to_string()))?;
    tracing::debug!(pages = pages.len(), chars = text.len(), "extracted PDF text");
    check_text(text, max_tokens)
}

/// Applies the emptiness and length checks to already-extracted text.
pub fn check_text(text: String, max_tokens: usize) -> Result<ExtractedText, PdfError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(PdfError::Empty);
    }

    let token_count = estimate_tokens(&text);
    if token_count > max_tokens {
        return Err(PdfError::TooLong {
            tokens: token_count,
            limit: max_tokens,
        });
    }
    Ok(ExtractedText { text, token_count })
}
