use super::testcase::ValueType;

const DOUBLE_EPSILON: f64 = 1e-4;

/// Type-aware equivalence of program output and expected output.
///
/// Both sides are trimmed first. A value that fails to parse as the requested
/// type makes the comparison `false`; it is never an error.
///
/// `Boolean` ignores ASCII case only, which covers every spelling of
/// `true`/`false`; non-ASCII letters must match exactly.
pub fn outputs_match(actual: &str, expected: &str, ty: ValueType) -> bool {
    let actual = actual.trim();
    let expected = expected.trim();

    use ValueType::*;
    match ty {
        String => actual == expected,
        Boolean => actual.eq_ignore_ascii_case(expected),
        Int => match (actual.parse::<i32>(), expected.parse::<i32>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
        Double => match (actual.parse::<f64>(), expected.parse::<f64>()) {
            (Ok(a), Ok(b)) => (a - b).abs() < DOUBLE_EPSILON,
            _ => false,
        },
    }
}

/// Same as [`outputs_match`] but takes the raw type tag as stored in case files.
pub fn outputs_match_tag(actual: &str, expected: &str, tag: &str) -> bool {
    outputs_match(actual, expected, ValueType::from_tag(tag))
}
