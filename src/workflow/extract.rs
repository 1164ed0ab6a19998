use crate::error::{Error, Result};
use crate::page_range;
use crate::pdf::PdfDocument;
use std::path::PathBuf;
use tracing::info;

/// A checked extraction: both files chosen and a non-empty selection.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub output: PathBuf,
    pub pages: usize,
}

/// Copy the selected pages, in selection order, into a new PDF at `request.output`.
pub fn run(request: &ExtractRequest) -> Result<ExtractSummary> {
    let doc = PdfDocument::open(&request.input)?;
    let indices = page_range::parse(&request.expression, doc.page_count())?;

    if indices.is_empty() {
        return Err(Error::NoPagesSelected);
    }

    let mut new_doc = doc.extract_pages(&indices)?;
    drop(doc);
    PdfDocument::save(&mut new_doc, &request.output)?;

    info!(
        input = %request.input.display(),
        output = %request.output.display(),
        pages = indices.len(),
        "extracted pages"
    );

    Ok(ExtractSummary {
        output: request.output.clone(),
        pages: indices.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::fixtures::{sample_document, write_to};

    fn page_contents(path: &std::path::Path) -> Vec<Vec<u8>> {
        let doc = PdfDocument::open(path).unwrap();
        doc.page_ids()
            .into_iter()
            .map(|id| doc.doc.get_page_content(id).unwrap())
            .collect()
    }

    fn request(dir: &tempfile::TempDir, pages: u32, expression: &str) -> ExtractRequest {
        ExtractRequest {
            input: write_to(sample_document(pages), dir.path(), "in.pdf"),
            output: dir.path().join("out.pdf"),
            expression: expression.to_string(),
        }
    }

    #[test]
    fn test_extract_all_pages_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, 6, "1-6");

        let summary = run(&request).unwrap();
        assert_eq!(summary.pages, 6);
        assert_eq!(summary.output, request.output);
        assert_eq!(page_contents(&request.output), page_contents(&request.input));
    }

    #[test]
    fn test_extract_follows_selection_order() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, 4, "3, 1, 1, 2-3");
        let source = page_contents(&request.input);

        assert_eq!(run(&request).unwrap().pages, 5);
        let expected: Vec<_> = [2, 0, 0, 1, 2].iter().map(|&i| source[i].clone()).collect();
        assert_eq!(page_contents(&request.output), expected);
    }

    #[test]
    fn test_parse_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, 3, "1, 4");

        assert!(matches!(
            run(&request),
            Err(Error::OutOfRange { page: 4, total: 3 })
        ));
        assert!(!request.output.exists());
    }

    #[test]
    fn test_only_empty_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, 3, " , ");
        assert!(matches!(run(&request), Err(Error::NoPagesSelected)));
        assert!(!request.output.exists());
    }

    #[test]
    fn test_unreadable_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = ExtractRequest {
            input: dir.path().join("missing.pdf"),
            output: dir.path().join("out.pdf"),
            expression: "1".to_string(),
        };
        assert!(matches!(run(&request), Err(Error::Read { .. })));
    }

    #[test]
    fn test_unwritable_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request(&dir, 2, "1");
        request.output = dir.path().join("no-such-dir").join("out.pdf");
        assert!(matches!(run(&request), Err(Error::Write { .. })));
    }
}
