//! Identifier derivation for connection variable names
//!
//! The current revision of a tenant is tracked under a variable whose name is
//! derived from the tenant alias or name. Derived names must be usable both as
//! an identifier and as an environment variable name.

use std::sync::OnceLock;

use regex::Regex;

use super::ConnectionError;

/// Suffix appended to the tenant alias or name when deriving the variable name
pub const CURRENT_REVISION_ID_SUFFIX: &str = "_CURRENT_REVISION_ID";

/// Strict, reserved and edition-dependent keywords that cannot name a variable
const RESERVED_KEYWORDS: &[&str] = &[
    "Self", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
    "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

static NON_WORD: OnceLock<Regex> = OnceLock::new();
static LEADING_DIGIT: OnceLock<Regex> = OnceLock::new();
static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

// Letters, numbers and underscore; narrower than the regex crate's `\w`,
// which also admits combining marks and joiners.
fn non_word() -> &'static Regex {
    NON_WORD.get_or_init(|| Regex::new(r"[^\p{L}\p{N}_]").expect("non-word pattern compiles"))
}

fn leading_digit() -> &'static Regex {
    LEADING_DIGIT.get_or_init(|| Regex::new(r"^\d").expect("leading digit pattern compiles"))
}

fn identifier() -> &'static Regex {
    IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[\p{XID_Start}_]\p{XID_Continue}*$").expect("identifier pattern compiles")
    })
}

/// Replace every character that is not a letter, number or `_` with `_` and
/// prefix a leading decimal digit with `_`.
pub fn sanitize_identifier(candidate: &str) -> String {
    let mut sanitized = non_word().replace_all(candidate, "_").into_owned();
    if leading_digit().is_match(&sanitized) {
        sanitized.insert(0, '_');
    }
    sanitized
}

/// Whether `name` is a reserved keyword
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name)
}

/// Check that `name` is a legal, non-reserved identifier.
pub fn validate_identifier(name: &str) -> Result<(), ConnectionError> {
    if !identifier().is_match(name) || is_reserved_keyword(name) {
        return Err(ConnectionError::InvalidIdentifier {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Derive the current revision variable name for a tenant alias or name.
///
/// The candidate `{base}_CURRENT_REVISION_ID` is sanitized and then validated;
/// the error carries the sanitized candidate.
pub fn derive_revision_var_name(base: &str) -> Result<String, ConnectionError> {
    let candidate = sanitize_identifier(&format!("{base}{CURRENT_REVISION_ID_SUFFIX}"));
    validate_identifier(&candidate)?;
    Ok(candidate)
}
