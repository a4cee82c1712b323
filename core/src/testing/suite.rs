use serde::{Deserialize, Serialize};

use super::testcase::{sanitize_filename, TestCase};

/// Named, ordered, duplicate-free list of test-case keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    title: String,
    case_keys: Vec<String>,
}

impl TestSuite {
    pub const FILE_EXT: &str = "suite";

    /// The title is stored trimmed.
    pub fn new(title: impl Into<String>) -> Self {
        let title: String = title.into();
        Self {
            title: title.trim().to_owned(),
            case_keys: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn key(&self) -> String {
        sanitize_filename(&self.title)
    }

    pub fn filename(&self) -> String {
        format!("{}.{}", self.key(), Self::FILE_EXT)
    }

    pub fn case_keys(&self) -> &[String] {
        &self.case_keys
    }

    pub fn len(&self) -> usize {
        self.case_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.case_keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.case_keys.iter().any(|k| k == key)
    }

    /// Returns `false` (and leaves the suite unchanged) if `key` is already present.
    pub fn add(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.case_keys.push(key);
        true
    }

    pub fn add_case(&mut self, case: &TestCase) -> bool {
        self.add(case.key())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.case_keys.len();
        self.case_keys.retain(|k| k != key);
        before != self.case_keys.len()
    }

    /// Title line followed by one reference per line.
    pub fn to_file_contents(&self) -> String {
        let mut s = String::with_capacity(self.title.len() + 32 * self.case_keys.len());
        s += &self.title;
        s.push('\n');
        for key in &self.case_keys {
            s += key;
            s.push('\n');
        }
        s
    }

    /// Blank reference lines are ignored. References written as case filenames
    /// (`<key>.testcase`) are normalised to the bare key.
    /// Returns `None` when there is no title line.
    pub fn from_file_contents(contents: &str) -> Option<Self> {
        let mut lines = contents.lines();
        let title = lines.next()?.trim();
        let mut suite = Self::new(title);
        for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
            let key = line
                .strip_suffix(TestCase::FILE_EXT)
                .and_then(|stem| stem.strip_suffix('.'))
                .unwrap_or(line);
            suite.add(key);
        }
        Some(suite)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_rejects_duplicates() {
        let mut s = TestSuite::new("Week 1");
        assert!(s.add("a"));
        assert!(s.add("b"));
        assert!(!s.add("a"));
        assert!(!s.add("b"));
        assert_eq!(s.case_keys(), ["a", "b"]);
    }

    #[test]
    fn remove_key() {
        let mut s = TestSuite::new("Week 1");
        s.add("a");
        s.add("b");
        assert!(s.remove("a"));
        assert!(!s.remove("a"));
        assert_eq!(s.case_keys(), ["b"]);
    }

    #[test]
    fn file_contents_roundtrip_keeps_order() {
        let mut s = TestSuite::new("Week 1: loops");
        for k in ["zeta", "alpha", "mid"] {
            s.add(k);
        }
        let got = TestSuite::from_file_contents(&s.to_file_contents()).unwrap();
        assert_eq!(got, s);
        assert_eq!(s.filename(), "Week_1__loops.suite");
    }

    #[test]
    fn blank_lines_and_legacy_filenames() {
        let got = TestSuite::from_file_contents("Lab\n\nfirst.testcase\n  \nsecond\nfirst\n").unwrap();
        assert_eq!(got.title(), "Lab");
        assert_eq!(got.case_keys(), ["first", "second"]);
    }

    #[test]
    fn empty_file_has_no_title() {
        assert_eq!(TestSuite::from_file_contents(""), None);
    }
}
