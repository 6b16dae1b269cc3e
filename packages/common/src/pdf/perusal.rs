use super::error::PdfError;
use super::watermark::{load_document, serialize};

/// Derive a page-limited perusal copy from a full manuscript.
///
/// Sources already within `max_pages` pass through byte-identical; longer
/// sources have their trailing pages deleted and orphaned objects pruned so
/// the derivative can never expose the complete work.
pub fn derive_perusal(pdf: &[u8], max_pages: u32) -> Result<Vec<u8>, PdfError> {
    if max_pages == 0 {
        return Err(PdfError::InvalidOptions(
            "max_pages must be at least 1".into(),
        ));
    }

    let mut doc = load_document(pdf)?;
    let total = doc.get_pages().len() as u32;
    if total <= max_pages {
        return Ok(pdf.to_vec());
    }

    let excess: Vec<u32> = (max_pages + 1..=total).collect();
    doc.delete_pages(&excess);
    doc.prune_objects();
    serialize(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{build_pdf, page_texts};
    use super::super::watermark::page_count;
    use super::*;

    #[test]
    fn long_manuscripts_are_truncated() {
        let input = build_pdf(12);
        let output = derive_perusal(&input, 10).unwrap();
        assert_eq!(page_count(&output).unwrap(), 10);
    }

    #[test]
    fn truncation_keeps_leading_pages() {
        let input = build_pdf(5);
        let output = derive_perusal(&input, 2).unwrap();
        let texts = page_texts(&output);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Page 1"));
        assert!(texts[1].contains("Page 2"));
    }

    #[test]
    fn short_manuscripts_pass_through_unchanged() {
        let input = build_pdf(3);
        let output = derive_perusal(&input, 10).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn exact_limit_passes_through() {
        let input = build_pdf(10);
        let output = derive_perusal(&input, 10).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn zero_max_pages_is_rejected() {
        let input = build_pdf(3);
        assert!(matches!(
            derive_perusal(&input, 0),
            Err(PdfError::InvalidOptions(_))
        ));
    }

    #[test]
    fn garbage_input_is_malformed() {
        assert!(matches!(
            derive_perusal(b"not a pdf", 10),
            Err(PdfError::Malformed(_))
        ));
    }
}
