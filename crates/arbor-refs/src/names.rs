//! Git-style branch and tag name validation.
//!
//! A valid name is non-empty, made of non-empty `/`-separated components
//! that do not start with `.`, and contains none of the characters or
//! sequences git reserves for revision syntax.

use crate::error::{RefError, RefResult};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];
const FORBIDDEN_SEQUENCES: &[&str] = &["..", "@{", "//"];

/// Validate a branch name.
///
/// ```
/// use arbor_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/tables").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    check(name).map_err(|reason| RefError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Validate a tag name. Same rules as branch names.
pub fn validate_tag_name(name: &str) -> RefResult<()> {
    validate_branch_name(name)
}

fn check(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".into());
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(format!("contains forbidden character {ch:?}"));
    }
    if let Some(seq) = FORBIDDEN_SEQUENCES.iter().find(|s| name.contains(**s)) {
        return Err(format!("must not contain {seq:?}"));
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return Err("must not end with '.' or '.lock'".into());
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err("must not start or end with '/'".into());
        }
        if component.starts_with('.') {
            return Err(format!("component {component:?} starts with '.'"));
        }
    }
    Ok(())
}
