use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::error::DiscoveryError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompileState {
    #[default]
    Untried,
    Succeeded,
    Failed,
}

/// One student's folder, resolved to a single entry-point source file.
#[derive(Debug)]
pub struct Submission {
    name: String,
    source_file: PathBuf,
    compile_state: CompileState,
    last_exit_code: Option<i32>,
    program_name: OnceCell<String>,
}

impl Submission {
    pub fn new(name: impl Into<String>, source_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            compile_state: CompileState::Untried,
            last_exit_code: None,
            program_name: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn source_dir(&self) -> &Path {
        self.source_file.parent().unwrap_or(Path::new("."))
    }

    pub fn compile_state(&self) -> CompileState {
        self.compile_state
    }

    pub(crate) fn set_compile_state(&mut self, state: CompileState) {
        self.compile_state = state;
    }

    pub fn last_exit_code(&self) -> Option<i32> {
        self.last_exit_code
    }

    pub(crate) fn set_last_exit_code(&mut self, code: Option<i32>) {
        self.last_exit_code = code;
    }

    /// Name passed to the runtime: the public class declared in the source,
    /// or the file stem when none is found. Computed once.
    pub fn program_name(&self) -> &str {
        self.program_name.get_or_init(|| {
            fsutil::read_to_string(&self.source_file)
                .ok()
                .and_then(|src| find_public_class_name(&src))
                .unwrap_or_else(|| {
                    self.source_file
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                })
        })
    }
}

/// Identifier following the first `public class ` declaration.
///
/// ```
/// use gradekit_core::submission::find_public_class_name;
///
/// assert_eq!(find_public_class_name("public class Main {").as_deref(), Some("Main"));
/// assert_eq!(find_public_class_name("  public class Calc{").as_deref(), Some("Calc"));
/// assert_eq!(find_public_class_name("class Hidden {}"), None);
/// ```
pub fn find_public_class_name(source: &str) -> Option<String> {
    const DECL: &str = "public class ";
    source.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(DECL)?.trim_start();
        let name: String = rest
            .chars()
            .take_while(|&c| c.is_alphanumeric() || c == '_' || c == '$')
            .collect();
        (!name.is_empty()).then_some(name)
    })
}

/// Heuristic entry-point check: some single line contains `public`, `static`,
/// `void` and `main(`.
///
/// This is a plain substring match, not a parse. Tokens inside comments or
/// string literals count, and a signature split across lines does not.
///
/// ```
/// use gradekit_core::submission::has_entry_point;
///
/// assert!(has_entry_point("  public static void main(String[] args) {"));
/// assert!(has_entry_point("// public static void main( in a comment"));
/// assert!(!has_entry_point("public static void\nmain(String[] args)"));
/// assert!(!has_entry_point("static void main(String[] args)"));
/// ```
pub fn has_entry_point(source: &str) -> bool {
    source.lines().any(|line| {
        line.contains("public")
            && line.contains("static")
            && line.contains("void")
            && line.contains("main(")
    })
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub submissions: Vec<Submission>,
    pub skipped: Vec<String>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

/// Resolves one entry-point source per immediate subfolder of `root`.
///
/// Subfolders are visited in name order and candidate files are examined in
/// filename order, so the first matching file is deterministic.
/// Every subfolder ends up either as a submission or in `skipped`.
pub fn discover(
    root: impl AsRef<Path>,
    code_path: &str,
    source_ext: &str,
) -> Result<Discovery, DiscoveryError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(DiscoveryError::RootNotDirectory(root.to_owned()));
    }
    let folders = fsutil::list_subdirs(root).map_err(DiscoveryError::ListRoot)?;

    let pattern = source_pattern(source_ext)?;
    let code_path = code_path.trim();
    let mut res = Discovery::default();

    for folder in folders {
        let name = folder
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let search_dir = if code_path.is_empty() {
            folder
        } else {
            folder.join(code_path)
        };

        match find_entry_point_file(&search_dir, &pattern) {
            Ok(file) => {
                log::debug!("{}: entry point {}", name, file.to_string_lossy());
                res.submissions.push(Submission::new(name, file));
            }
            Err(reason) => {
                log::info!("Skipping '{}': {}", name, reason);
                res.skipped.push(name);
            }
        }
    }
    Ok(res)
}

fn source_pattern(source_ext: &str) -> Result<glob::Pattern, DiscoveryError> {
    let ext = source_ext.trim_start_matches('.');
    glob::Pattern::new(&format!("*.{}", glob::Pattern::escape(ext)))
        .map_err(|e| DiscoveryError::InvalidSourceExt(source_ext.to_owned(), e))
}

fn find_entry_point_file(search_dir: &Path, pattern: &glob::Pattern) -> Result<PathBuf, String> {
    if !search_dir.is_dir() {
        return Err(format!(
            "search folder '{}' does not exist",
            search_dir.to_string_lossy()
        ));
    }
    let candidates = fsutil::list_files_matching(search_dir, pattern).map_err(|e| e.to_string())?;
    if candidates.is_empty() {
        return Err(format!("no '{}' file found", pattern));
    }
    candidates
        .into_iter()
        .find(|file| match fsutil::read_to_string(file) {
            Ok(src) => has_entry_point(&src),
            Err(e) => {
                log::warn!("{:#}", e);
                false
            }
        })
        .ok_or_else(|| "no source file declares a main method".to_owned())
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    const MAIN_SRC: &str = "public class Main {\n    public static void main(String[] args) {}\n}\n";
    const HELPER_SRC: &str = "public class Helper {\n    static int twice(int x) { return 2 * x; }\n}\n";

    fn write(path: impl AsRef<Path>, contents: &str) {
        fsutil::write_with_mkdir(path, contents).unwrap();
    }

    fn names(d: &Discovery) -> Vec<&str> {
        d.submissions.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn submissions_and_skipped_cover_all_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root.join("alice/Main.java"), MAIN_SRC);
        write(root.join("bob/Helper.java"), HELPER_SRC);
        write(root.join("carol/notes.txt"), "nothing here");
        fs::create_dir(root.join("dave")).unwrap();
        write(root.join("stray.java"), MAIN_SRC);

        let d = discover(root, "", "java").unwrap();
        assert_eq!(names(&d), ["alice"]);
        assert_eq!(d.skipped, ["bob", "carol", "dave"]);
    }

    #[test]
    fn first_matching_file_in_name_order_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root.join("alice/B.java"), MAIN_SRC);
        write(root.join("alice/A.java"), HELPER_SRC);
        write(root.join("alice/C.java"), MAIN_SRC);

        let d = discover(root, "", "java").unwrap();
        assert_eq!(
            d.submissions[0].source_file().file_name().unwrap(),
            "B.java"
        );
    }

    #[test]
    fn code_path_is_joined_to_each_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root.join("alice/src/Main.java"), MAIN_SRC);
        write(root.join("bob/Main.java"), MAIN_SRC);

        let d = discover(root, " src ", "java").unwrap();
        assert_eq!(names(&d), ["alice"]);
        assert_eq!(d.skipped, ["bob"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover(tmp.path().join("nope"), "", "java").unwrap_err();
        assert!(matches!(err, DiscoveryError::RootNotDirectory(_)));
    }

    #[test]
    fn program_name_prefers_declared_class() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("Solution.java");
        write(&file, "import java.util.*;\npublic class Calculator {\n}\n");
        assert_eq!(Submission::new("x", &file).program_name(), "Calculator");

        let file = tmp.path().join("Fallback.java");
        write(&file, "class Hidden {}\n");
        assert_eq!(Submission::new("x", &file).program_name(), "Fallback");
    }
}
