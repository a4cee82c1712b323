use std::{
    path::{Path, PathBuf},
    process::exit,
};

pub fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("Failed to get current dir: {}", e);
        exit(1);
    })
}

/// Relative paths given on the command line are relative to the current dir.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        current_dir().join(path)
    }
}

pub fn replace_homedir_to_tilde(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    let Some(home_dir) = ::dirs::home_dir() else {
        return path
    };
    path.strip_prefix(home_dir)
        .map(|path| Path::new("~").join(path))
        .unwrap_or(path)
}
