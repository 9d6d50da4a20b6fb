//! Variable references inside formulas.
//!
//! Three syntaxes are recognized, in precedence order:
//! - `${name}`
//! - `{name}`
//! - bare identifiers `[A-Za-z][A-Za-z0-9_]*`, e.g. element codes like `E001`
//!
//! Braced names may contain any character except `}` and are trimmed. A bare identifier
//! only counts when it starts a word run, so the `e3` in `1e3` is not a reference.

use std::collections::BTreeSet;
use std::iter::Peekable;
use std::str::CharIndices;

/// Bare identifiers that are never treated as variables.
pub const RESERVED_IDENTIFIERS: [&str; 3] = ["Math", "PI", "E"];

#[must_use]
pub fn is_reserved(identifier: &str) -> bool {
    RESERVED_IDENTIFIERS.contains(&identifier)
}

pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Names referenced by `formula`, deduplicated.
///
/// Identifiers inside a braced reference are part of that reference and are not reported
/// on their own.
#[must_use]
pub fn extract_variables(formula: &str) -> BTreeSet<String> {
    let mut variables = BTreeSet::new();
    let mut chars = formula.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        match ch {
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                let Some(&(brace, _)) = chars.peek() else {
                    continue;
                };
                if let Some(name) = take_braced(formula, brace, &mut chars) {
                    variables.insert(name);
                }
            }
            '{' => {
                if let Some(name) = take_braced(formula, start, &mut chars) {
                    variables.insert(name);
                }
            }
            c if is_word_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(idx, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    end = idx + next.len_utf8();
                    chars.next();
                }
                let word = &formula[start..end];
                if c.is_ascii_alphabetic() && !is_reserved(word) {
                    variables.insert(word.to_string());
                }
            }
            _ => {}
        }
    }

    variables
}

/// Reads `{name}` starting at the byte offset of `{`, advancing `chars` past the closing brace.
///
/// An unclosed brace leaves `chars` untouched so the remaining text is still scanned.
pub(crate) fn take_braced(
    formula: &str,
    open: usize,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Option<String> {
    let body_start = open + '{'.len_utf8();
    let close = body_start + formula[body_start..].find('}')?;
    while let Some(&(idx, _)) = chars.peek() {
        if idx > close {
            break;
        }
        chars.next();
    }
    let name = formula[body_start..close].trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(formula: &str) -> Vec<String> {
        extract_variables(formula).into_iter().collect()
    }

    #[test]
    fn mixed_syntaxes() {
        assert_eq!(vars("${A} + B * C"), vec!["A", "B", "C"]);
        assert_eq!(vars("{floor area} / E002"), vec!["E002", "floor area"]);
    }

    #[test]
    fn deduplicates_across_syntaxes() {
        assert_eq!(vars("E001 + ${E001} + {E001}"), vec!["E001"]);
    }

    #[test]
    fn braced_names_are_not_split_into_identifiers() {
        assert_eq!(vars("{school-id} * 2"), vec!["school-id"]);
        assert_eq!(vars("${ padded }"), vec!["padded"]);
    }

    #[test]
    fn skips_reserved_and_numeric_runs() {
        assert_eq!(vars("PI * r * r + E + Math"), vec!["r"]);
        assert_eq!(vars("1e3 + 2"), Vec::<String>::new());
        assert_eq!(vars("_hidden + x_1"), vec!["x_1"]);
    }

    #[test]
    fn unclosed_brace_keeps_scanning() {
        assert_eq!(vars("{A + B"), vec!["A", "B"]);
        assert_eq!(vars("{} + C"), vec!["C"]);
    }

    #[test]
    fn non_ascii_text_separates_identifiers() {
        assert_eq!(vars("面积A+面积B"), vec!["A", "B"]);
    }
}
