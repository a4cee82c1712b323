use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Fs(#[from] fsutil::Error),

    #[error("Invalid test case file format {0:?}: expected 4 lines (title, type, input, expected output)")]
    MalformedCase(PathBuf),

    #[error("Invalid test suite file format {0:?}: missing title line")]
    MalformedSuite(PathBuf),

    #[error("The {field} must be a single line")]
    MultiLineField { field: &'static str },

    #[error("Title must not be blank")]
    BlankTitle,

    #[error("No such test case '{0}'")]
    NoSuchCase(String),

    #[error("No such test suite '{0}'")]
    NoSuchSuite(String),

    #[error("Test suite '{0}' already exists")]
    SuiteExists(String),
}
