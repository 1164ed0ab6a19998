use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while selecting, extracting or previewing pages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Please select input PDF")]
    MissingInput,

    #[error("Please select output PDF")]
    MissingOutput,

    #[error("Please enter page selection")]
    EmptyExpression,

    #[error("Invalid range: {0}")]
    MalformedRange(String),

    #[error("Invalid range: {start} > {end}")]
    InvertedRange { start: i64, end: i64 },

    #[error("Invalid page number: {0}")]
    NotAnInteger(String),

    #[error("Page {page} is out of range (1-{total})")]
    OutOfRange { page: i64, total: u32 },

    #[error("No pages selected")]
    NoPagesSelected,

    #[error("Too many pages to preview ({count}, at most {max})")]
    TooManyPages { count: usize, max: usize },

    #[error("Failed to open PDF {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Failed to save PDF {}: {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("Failed to render pages: {0}")]
    Render(String),
}
