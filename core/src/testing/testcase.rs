use serde::{Deserialize, Serialize};

/// How expected and actual output are interpreted when compared.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
pub enum ValueType {
    #[default]
    String,
    Boolean,
    Int,
    Double,
}

impl ValueType {
    /// Tags are matched exactly. Blank and unknown tags fall back to `String`.
    ///
    /// ```
    /// use gradekit_core::testing::ValueType;
    ///
    /// assert_eq!(ValueType::from_tag("Double"), ValueType::Double);
    /// assert_eq!(ValueType::from_tag(""), ValueType::String);
    /// assert_eq!(ValueType::from_tag("double"), ValueType::String);
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        use ValueType::*;
        match tag {
            "Boolean" => Boolean,
            "Int" => Int,
            "Double" => Double,
            _ => String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub title: String,
    pub value_type: ValueType,
    pub input: String,
    pub expected: String,
}

impl TestCase {
    pub const FILE_EXT: &str = "testcase";

    pub fn new(
        title: impl Into<String>,
        value_type: ValueType,
        input: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            value_type,
            input: input.into(),
            expected: expected.into(),
        }
    }

    /// Key under which suites reference this case. Surrounding whitespace
    /// of the title does not take part in it.
    pub fn key(&self) -> String {
        sanitize_filename(self.title.trim())
    }

    /// Same case with every text field trimmed, as it reads back from a file.
    pub fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_owned(),
            value_type: self.value_type,
            input: self.input.trim().to_owned(),
            expected: self.expected.trim().to_owned(),
        }
    }

    pub fn filename(&self) -> String {
        format!("{}.{}", self.key(), Self::FILE_EXT)
    }

    /// Four lines: title, type tag, input, expected output.
    pub fn to_file_contents(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n",
            self.title, self.value_type, self.input, self.expected
        )
    }

    /// Returns `None` when fewer than four lines are present.
    pub fn from_file_contents(contents: &str) -> Option<Self> {
        let lines: Vec<&str> = contents.lines().collect();
        let [title, tag, input, expected, ..] = lines.as_slice() else {
            return None
        };
        Some(Self {
            title: title.trim().to_owned(),
            value_type: ValueType::from_tag(tag.trim()),
            input: input.trim().to_owned(),
            expected: expected.trim().to_owned(),
        })
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
///
/// ```
/// use gradekit_core::testing::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Add two numbers"), "Add_two_numbers");
/// assert_eq!(sanitize_filename("v1.2-final_x"), "v1.2-final_x");
/// assert_eq!(sanitize_filename("a/b\\c?"), "a_b_c_");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_contents_roundtrip() {
        let t = TestCase::new("Sum of 3 & 4", ValueType::Int, "3 4", "7");
        let got = TestCase::from_file_contents(&t.to_file_contents()).unwrap();
        assert_eq!(got, t);
        assert_eq!(t.filename(), "Sum_of_3___4.testcase");
    }

    #[test]
    fn fields_are_trimmed_on_load() {
        let got = TestCase::from_file_contents("  Greeting \n Boolean\n  world \n true  \nextra\n")
            .unwrap();
        assert_eq!(got.title, "Greeting");
        assert_eq!(got.value_type, ValueType::Boolean);
        assert_eq!(got.input, "world");
        assert_eq!(got.expected, "true");
    }

    #[test]
    fn key_ignores_surrounding_whitespace() {
        let t = TestCase::new(" Sum ", ValueType::Int, " 3 4 ", "7 ");
        assert_eq!(t.key(), "Sum");
        assert_eq!(t.filename(), "Sum.testcase");

        let t = t.normalized();
        assert_eq!(TestCase::from_file_contents(&t.to_file_contents()), Some(t));
    }

    #[test]
    fn too_few_lines() {
        assert_eq!(TestCase::from_file_contents("title\nString\ninput\n"), None);
        assert_eq!(TestCase::from_file_contents(""), None);
    }

    #[test]
    fn empty_input_line_is_kept() {
        let t = TestCase::new("No input", ValueType::String, "", "hello");
        let got = TestCase::from_file_contents(&t.to_file_contents()).unwrap();
        assert_eq!(got.input, "");
        assert_eq!(got.expected, "hello");
    }
}
