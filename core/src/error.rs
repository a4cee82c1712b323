use std::path::PathBuf;

pub use crate::storage::PersistenceError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No test suite selected")]
    NoSuiteSelected,

    #[error("Root folder not set")]
    RootUnset,

    #[error("Storage folder not set")]
    StorageUnset,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Root folder does not exist or is not a directory: {0:?}")]
    RootNotDirectory(PathBuf),

    #[error("Invalid source file extension '{0}'")]
    InvalidSourceExt(String, #[source] glob::PatternError),

    #[error("Cannot list submission folders")]
    ListRoot(#[source] fsutil::Error),

    #[error("No student programs found in root folder {0:?}. Check that it contains one subfolder per student, each with a source file declaring a main method")]
    NoSubmissions(PathBuf),
}

/// Failures that abort a whole run before any process is spawned, or stop it between submissions.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("No test cases found in test suite '{suite}'. Add test cases to the suite first")]
    Resolution { suite: String },

    #[error("Run interrupted")]
    Interrupted,
}
