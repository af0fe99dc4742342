//! PDF and HTML to plain text.

use std::io::Cursor;

/// Rendering width for the HTML conversion. Downstream consumers are prompts,
/// not terminals, so the exact value only affects wrapping.
const HTML_RENDER_WIDTH: usize = 100;

/// Convert HTML to readable markdown-ish plain text.
///
/// This is intentionally "good enough" and deterministic, not a full
/// readability engine. On conversion failure the raw HTML is returned rather
/// than an error; the text still carries the document's content.
pub fn html_to_markdown(html: &str) -> String {
    // html2text expects bytes; Cursor avoids allocating a second large buffer.
    html2text::from_read(Cursor::new(html.as_bytes()), HTML_RENDER_WIDTH)
        .unwrap_or_else(|_| html.to_string())
}

/// Extract text from a PDF body (in-memory bytes).
///
/// Pages are read in document order and concatenated; a PDF with no
/// extractable text yields an empty string, not an error. Errors are kept as
/// strings so callers can wrap them into their own taxonomy.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
}

/// Best-effort sniff for PDF bytes (magic header).
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_conversion_keeps_text_and_drops_tags() {
        let html = "<html><body><h1>A Title</h1><p>Body text here.</p></body></html>";
        let text = html_to_markdown(html);
        assert!(text.contains("A Title"));
        assert!(text.contains("Body text here."));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn pdf_sniff_accepts_magic_and_rejects_html() {
        assert!(bytes_look_like_pdf(b"%PDF-1.7\n..."));
        assert!(!bytes_look_like_pdf(b"<!doctype html><html>"));
        assert!(!bytes_look_like_pdf(b""));
    }
}
