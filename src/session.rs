use crate::error::{Error, Result};
use crate::pdf::PdfDocument;
use crate::workflow::extract::ExtractRequest;
use crate::workflow::preview::PreviewRequest;
use std::path::{Path, PathBuf};

/// What the user has chosen so far: files and the page selection.
#[derive(Debug, Default, Clone)]
pub struct Session {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub expression: String,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    /// Select the input file and report how many pages it has.
    ///
    /// The path is remembered even when it cannot be read, so a later
    /// extraction reports the read failure rather than a missing input.
    pub fn select_input(&mut self, path: &Path) -> Result<u32> {
        self.input = Some(path.to_path_buf());
        let doc = PdfDocument::open(path)?;
        Ok(doc.page_count())
    }

    pub fn select_output(&mut self, path: &Path) {
        self.output = Some(path.to_path_buf());
    }

    pub fn set_expression(&mut self, expression: &str) {
        self.expression = expression.to_string();
    }

    /// Check the preconditions of an extraction, in the order the user is asked to fix them.
    pub fn extract_request(&self) -> Result<ExtractRequest> {
        let input = self.input.clone().ok_or(Error::MissingInput)?;
        let output = self.output.clone().ok_or(Error::MissingOutput)?;
        if self.expression.is_empty() {
            return Err(Error::EmptyExpression);
        }
        Ok(ExtractRequest {
            input,
            output,
            expression: self.expression.clone(),
        })
    }

    pub fn preview_request(&self) -> Result<PreviewRequest> {
        let input = self.input.clone().ok_or(Error::MissingInput)?;
        if self.expression.is_empty() {
            return Err(Error::EmptyExpression);
        }
        Ok(PreviewRequest {
            input,
            expression: self.expression.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::document::fixtures::{sample_document, write_to};

    #[test]
    fn test_extract_preconditions_in_order() {
        let session = Session::new();
        assert!(matches!(session.extract_request(), Err(Error::MissingInput)));

        let session = session.with_input("in.pdf");
        assert!(matches!(session.extract_request(), Err(Error::MissingOutput)));

        let session = session.with_output("out.pdf");
        assert!(matches!(session.extract_request(), Err(Error::EmptyExpression)));

        let request = session.with_expression("1-2").extract_request().unwrap();
        assert_eq!(request.input, PathBuf::from("in.pdf"));
        assert_eq!(request.output, PathBuf::from("out.pdf"));
        assert_eq!(request.expression, "1-2");
    }

    #[test]
    fn test_preview_does_not_need_output() {
        let session = Session::new().with_expression("1");
        assert!(matches!(session.preview_request(), Err(Error::MissingInput)));

        let request = session.with_input("in.pdf").preview_request().unwrap();
        assert_eq!(request.input, PathBuf::from("in.pdf"));
    }

    #[test]
    fn test_missing_input_reported_before_empty_expression() {
        let session = Session::new().with_output("out.pdf");
        assert!(matches!(session.extract_request(), Err(Error::MissingInput)));
        assert!(matches!(session.preview_request(), Err(Error::MissingInput)));
    }

    #[test]
    fn test_select_input_reports_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_to(sample_document(5), dir.path(), "in.pdf");

        let mut session = Session::new();
        assert_eq!(session.select_input(&path).unwrap(), 5);
        assert_eq!(session.input.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_unreadable_input_is_still_selected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let mut session = Session::new();
        assert!(matches!(session.select_input(&path), Err(Error::Read { .. })));
        assert_eq!(session.input.as_deref(), Some(path.as_path()));
    }
}
