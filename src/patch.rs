//! Line patching
//!
//! Purely textual, line-oriented replacement: on the declared line, the
//! first `<variable> = <token>` occurrence has its token swapped for the
//! rendered literal. Everything else on the line, and every other line, is
//! preserved byte-for-byte. No attempt is made to keep the result
//! syntactically valid in the target language.

use crate::expand::Edit;
use regex::Regex;
use std::fmt;
use std::path::PathBuf;

/// A per-edit-set patch failure. Recovered at the driver level: the current
/// run is abandoned, the sweep continues.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchError {
    /// The declared line number exceeds the file's line count.
    LineNotFound {
        path: PathBuf,
        line_number: usize,
        line_count: usize,
    },
    /// The declared line exists but carries no `<variable> =` assignment.
    VariableNotFound {
        path: PathBuf,
        line_number: usize,
        variable: String,
    },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::LineNotFound {
                path,
                line_number,
                line_count,
            } => write!(
                f,
                "{} has {} lines, but line {} was declared",
                path.display(),
                line_count,
                line_number
            ),
            PatchError::VariableNotFound {
                path,
                line_number,
                variable,
            } => write!(
                f,
                "no assignment to {} found on {}:{}",
                variable,
                path.display(),
                line_number
            ),
        }
    }
}

impl std::error::Error for PatchError {}

/// Apply every edit in `edits` (all targeting the same file) to
/// `original_lines`, returning the patched line vector.
///
/// Edits are applied in sequence against the progressively patched lines.
/// Line numbers always refer to the original file's numbering: only in-place
/// token replacement occurs, never insertion or deletion of lines.
pub fn patch_lines(original_lines: &[String], edits: &[&Edit]) -> Result<Vec<String>, PatchError> {
    let mut patched: Vec<String> = original_lines.to_vec();

    for edit in edits {
        let index = edit.line_number - 1;
        let line = patched.get(index).ok_or_else(|| PatchError::LineNotFound {
            path: edit.path.clone(),
            line_number: edit.line_number,
            line_count: original_lines.len(),
        })?;

        let new_line =
            replace_assignment(line, &edit.variable, &edit.value.render()).ok_or_else(|| {
                PatchError::VariableNotFound {
                    path: edit.path.clone(),
                    line_number: edit.line_number,
                    variable: edit.variable.clone(),
                }
            })?;

        patched[index] = new_line;
    }

    Ok(patched)
}

/// Replace the token assigned to `variable` on `line` with `replacement`.
///
/// Matches the first `<variable><ws>=<ws>` anchor on the line (`==` is a
/// comparison, not an assignment) and splices the replacement over the token
/// that follows. Returns `None` when the anchor is absent.
fn replace_assignment(line: &str, variable: &str, replacement: &str) -> Option<String> {
    // Identifier boundaries keep PARAM from matching inside MY_PARAM.
    let pattern = format!(r"\b{}\s*=", regex::escape(variable));
    let anchor = Regex::new(&pattern).expect("escaped variable name always compiles");

    for m in anchor.find_iter(line) {
        let rest = &line[m.end()..];
        if rest.starts_with('=') {
            // `==` is a comparison, keep looking
            continue;
        }

        let trimmed = rest.trim_start_matches([' ', '\t']);
        let token_start = m.end() + (rest.len() - trimmed.len());
        let token_end = token_start + token_length(&line[token_start..]);

        let mut result = String::with_capacity(line.len() + replacement.len());
        result.push_str(&line[..token_start]);
        result.push_str(replacement);
        result.push_str(&line[token_end..]);
        return Some(result);
    }
    None
}

/// Length in bytes of the value token at the start of `rest`.
///
/// A quoted token runs to its closing quote (backslash escapes respected);
/// a bare token runs to the first whitespace, delimiter, or comment marker.
fn token_length(rest: &str) -> usize {
    let mut chars = rest.char_indices();
    let Some((_, first)) = chars.next() else {
        return 0;
    };

    if first == '"' || first == '\'' {
        let mut escaped = false;
        for (i, c) in chars {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == first {
                return i + c.len_utf8();
            }
        }
        // Unterminated quote: treat the remainder as the token
        return rest.len();
    }

    for (i, c) in rest.char_indices() {
        if c.is_whitespace() || matches!(c, ',' | ')' | ';' | ']' | '}' | '#') {
            return i;
        }
    }
    rest.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep_file::LiteralValue;
    use std::path::PathBuf;

    fn edit(line_number: usize, variable: &str, value: LiteralValue) -> Edit {
        Edit {
            path: PathBuf::from("test.py"),
            line_number,
            variable: variable.to_string(),
            value,
        }
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_replaces_only_the_token() {
        let original = lines("PARAM=1\nprint(PARAM)\n");
        let e = edit(1, "PARAM", LiteralValue::Int(7));
        let patched = patch_lines(&original, &[&e]).unwrap();
        assert_eq!(patched[0], "PARAM=7");
        assert_eq!(patched[1], original[1]);
    }

    #[test]
    fn test_preserves_spacing_and_trailing_comment() {
        let original = lines("rate = 0.5   # tuned by hand\n");
        let e = edit(1, "rate", LiteralValue::Float(0.25));
        let patched = patch_lines(&original, &[&e]).unwrap();
        assert_eq!(patched[0], "rate = 0.25   # tuned by hand");
    }

    #[test]
    fn test_replaces_inside_call_argument() {
        let original = lines("train(epochs=10, batch=32)\n");
        let e = edit(1, "epochs", LiteralValue::Int(50));
        let patched = patch_lines(&original, &[&e]).unwrap();
        assert_eq!(patched[0], "train(epochs=50, batch=32)");
    }

    #[test]
    fn test_quoted_string_token_replaced_whole() {
        let original = lines("name = \"old value\"  # label\n");
        let e = edit(1, "name", LiteralValue::Str("new".into()));
        let patched = patch_lines(&original, &[&e]).unwrap();
        assert_eq!(patched[0], "name = \"new\"  # label");
    }

    #[test]
    fn test_last_line_is_valid_one_past_is_not() {
        let original = lines("a=1\nb=2\n");

        let ok = edit(2, "b", LiteralValue::Int(9));
        assert!(patch_lines(&original, &[&ok]).is_ok());

        let bad = edit(3, "c", LiteralValue::Int(9));
        match patch_lines(&original, &[&bad]) {
            Err(PatchError::LineNotFound {
                line_number,
                line_count,
                ..
            }) => {
                assert_eq!(line_number, 3);
                assert_eq!(line_count, 2);
            }
            other => panic!("expected LineNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_variable_is_an_error() {
        let original = lines("OTHER = 3\n");
        let e = edit(1, "PARAM", LiteralValue::Int(1));
        assert!(matches!(
            patch_lines(&original, &[&e]),
            Err(PatchError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_identifier_boundary_respected() {
        // PARAM must not match inside MY_PARAM
        let original = lines("MY_PARAM = 4\n");
        let e = edit(1, "PARAM", LiteralValue::Int(1));
        assert!(patch_lines(&original, &[&e]).is_err());
    }

    #[test]
    fn test_comparison_is_not_an_assignment() {
        let original = lines("if PARAM == 3:\n");
        let e = edit(1, "PARAM", LiteralValue::Int(1));
        assert!(patch_lines(&original, &[&e]).is_err());
    }

    #[test]
    fn test_sequential_edits_on_one_file() {
        let original = lines("a = 1\nb = 2\n");
        let e1 = edit(1, "a", LiteralValue::Int(10));
        let e2 = edit(2, "b", LiteralValue::Int(20));
        let patched = patch_lines(&original, &[&e1, &e2]).unwrap();
        assert_eq!(patched, vec!["a = 10", "b = 20"]);
    }

    #[test]
    fn test_two_edits_same_line() {
        let original = lines("f(x=1, y=2)\n");
        let e1 = edit(1, "x", LiteralValue::Int(5));
        let e2 = edit(1, "y", LiteralValue::Int(6));
        let patched = patch_lines(&original, &[&e1, &e2]).unwrap();
        assert_eq!(patched[0], "f(x=5, y=6)");
    }

    #[test]
    fn test_only_first_occurrence_on_line_changes() {
        let original = lines("x=1; x=2\n");
        let e = edit(1, "x", LiteralValue::Int(9));
        let patched = patch_lines(&original, &[&e]).unwrap();
        assert_eq!(patched[0], "x=9; x=2");
    }
}
