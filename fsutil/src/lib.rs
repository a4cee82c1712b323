use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File, ReadDir},
    io::BufReader,
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1:?}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("Failed to canonicalize path {0:?}: {1}")]
        CanonicalizePath(PathBuf, #[source] io::Error),

        #[error("Not a directory: {0:?}")]
        NotADirectory(PathBuf),

        #[error("Cannot serialize to JSON (dest={0:?}): {1}")]
        SerializeToJson(PathBuf, #[source] serde_json::Error),

        #[error("Cannot deserialize from JSON (src={0:?}): {1}")]
        DeserializeFromJson(PathBuf, #[source] serde_json::Error),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        if !dir.as_os_str().is_empty() {
            self::mkdir_all(dir)?;
        }
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn remove_file(filepath: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(&filepath)
        .map_err(|e| Error::SingleIO("Cannot remove file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_json_with_mkdir<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = serde_json::to_string_pretty(data)
        .map_err(|e| Error::SerializeToJson(filepath.as_ref().to_owned(), e))?;
    write_with_mkdir(filepath, &s)
}

#[must_use]
pub fn read_json_with_deserialize<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let filepath = filepath.as_ref();
    let f = File::open(filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.to_owned(), e))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| Error::DeserializeFromJson(filepath.to_owned(), e))
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

/// Immediate subdirectories of `dir`, sorted by name.
pub fn list_subdirs(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::NotADirectory(dir.to_owned()));
    }
    let mut res: Vec<PathBuf> = self::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    res.sort();
    Ok(res)
}

/// Regular files directly under `dir` whose filename matches `filename_pattern`, sorted by name.
pub fn list_files_matching(
    dir: impl AsRef<Path>,
    filename_pattern: &::glob::Pattern,
) -> Result<Vec<PathBuf>> {
    let mut res = Vec::new();
    for entry in self::read_dir(&dir)?.filter_map(std::result::Result::ok) {
        let Ok(ft) = entry.file_type() else {
            continue
        };
        if ft.is_dir() {
            continue;
        }
        if filename_pattern.matches(entry.file_name().to_string_lossy().as_ref()) {
            res.push(entry.path());
        }
    }
    res.sort();
    Ok(res)
}

/// Find the subdirectory of `parent` named `name`, ignoring ASCII case.
///
/// ```
/// let tmp = tempfile::tempdir().unwrap();
/// std::fs::create_dir(tmp.path().join("Test-Cases")).unwrap();
///
/// let found = fsutil::find_dir_ignore_case(tmp.path(), "test-cases").unwrap();
/// assert_eq!(found.file_name().unwrap(), "Test-Cases");
/// assert!(fsutil::find_dir_ignore_case(tmp.path(), "test-suites").is_none());
/// ```
pub fn find_dir_ignore_case(parent: impl AsRef<Path>, name: &str) -> Option<PathBuf> {
    let entries = self::read_dir(&parent).ok()?;
    entries
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|entry| entry.path())
}

pub fn canonicalize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path.canonicalize()
        .map_err(|e| Error::CanonicalizePath(path.to_owned(), e))
}

/// Normalize the path
/// ```
/// use fsutil::normalize_path;
/// use std::path::Path;
///
/// assert_eq!(normalize_path("./hoge/.config/././foo"), Path::new("hoge/.config/foo"));
/// assert_eq!(normalize_path("hoge/.config/../../bar/."), Path::new("bar"));
/// assert_eq!(normalize_path("../foo/../hello"), Path::new("../hello"));
/// assert_eq!(normalize_path("/"), Path::new("/"));
/// assert_eq!(normalize_path("/foo/"), Path::new("/foo"));
/// assert_eq!(normalize_path("./foo/"), Path::new("foo"));
/// assert_eq!(normalize_path("."), Path::new("."));
/// ```
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    use ::std::path::Component;
    let components = path.as_ref().components();
    let mut stack = Vec::with_capacity(components.size_hint().1.unwrap_or(4));
    for c in components {
        match c {
            Component::CurDir => (),
            Component::ParentDir
                if matches!(stack.last(), Some(Component::Normal(_))) =>
            {
                stack.pop();
            }
            _ => {
                stack.push(c);
            }
        }
    }
    if stack.is_empty() {
        stack.push(Component::CurDir);
    }
    stack.iter().collect()
}
