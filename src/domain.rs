use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;

use crate::format::Locale;

#[derive(Debug)]
pub enum TaskGridError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidFilter(String),
}

impl fmt::Display for TaskGridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskGridError::IoError(e) => write!(f, "I/O error: {e}"),
            TaskGridError::PolarsError(e) => write!(f, "Could not read task table: {e}"),
            TaskGridError::LoadingFailed(msg) => write!(f, "Loading failed: {msg}"),
            TaskGridError::FileNotFound => f.write_str("File not found"),
            TaskGridError::PermissionDenied => f.write_str("Permission denied"),
            TaskGridError::UnknownFileType => f.write_str("Unknown file type"),
            TaskGridError::InvalidFilter(msg) => write!(f, "Invalid filter: {msg}"),
        }
    }
}

impl std::error::Error for TaskGridError {}

impl From<Error> for TaskGridError {
    fn from(err: Error) -> Self {
        TaskGridError::IoError(err)
    }
}

impl From<PolarsError> for TaskGridError {
    fn from(err: PolarsError) -> Self {
        TaskGridError::PolarsError(err)
    }
}

/// Where filter items are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// The grid filters the rows of the current page.
    #[default]
    Client,
    /// Filters are sent with the page query and the source applies them.
    Server,
}

/// Settings of one grid view.
#[derive(Debug, Clone, Setters)]
pub struct GridConfig {
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub filter_mode: FilterMode,
    pub locale: Locale,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            page_size_options: vec![10, 25, 50],
            filter_mode: FilterMode::Client,
            locale: Locale::default(),
        }
    }
}
