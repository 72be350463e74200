// src/dospath.rs

//! DOS-style path folding and comparison
//!
//! Repository identity is case-insensitive and separator-agnostic: `foo/Bar`
//! and `FOO\bar` name the same entry. The TDS digest hashes paths in their
//! DOS form (backslashes), so the folding rules here are part of the wire
//! contract and must not change.

use std::cmp::Ordering;

/// Fold one byte for comparison: separators collapse to backslash, ASCII
/// letters to lower case. Non-ASCII bytes are preserved.
#[inline]
fn fold(b: u8) -> u8 {
    match b {
        b'/' => b'\\',
        _ => b.to_ascii_lowercase(),
    }
}

/// Convert a path to DOS form (forward slashes become backslashes).
pub fn to_dos(path: &str) -> String {
    path.replace('/', "\\")
}

/// Convert a path to Unix form (backslashes become forward slashes).
pub fn to_unix(path: &str) -> String {
    path.replace('\\', "/")
}

/// Compare two paths under the DOS rules: case-insensitive on ASCII,
/// `/` and `\` are the same character.
pub fn dos_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.bytes().map(fold);
    let mut bi = b.bytes().map(fold);
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Path equality under the DOS rules.
pub fn dos_eq(a: &str, b: &str) -> bool {
    dos_cmp(a, b) == Ordering::Equal
}

/// True iff the folded bytes of `path` begin with those of `needle`.
fn folded_prefix(path: &str, needle: &str) -> bool {
    path.len() >= needle.len()
        && path
            .bytes()
            .zip(needle.bytes())
            .all(|(a, b)| fold(a) == fold(b))
}

/// True iff `path` lies under `parent` (or equals it), DOS comparison.
pub fn is_parent_dir(parent: &str, path: &str) -> bool {
    let parent = parent.trim_end_matches(['/', '\\']);
    if !folded_prefix(path, parent) {
        return false;
    }
    matches!(
        path.as_bytes().get(parent.len()).copied(),
        None | Some(b'/') | Some(b'\\')
    )
}

/// True iff `rel` begins with `<prefix>/<sub>/`. This is the classification
/// test for run/doc/source file lists.
pub fn starts_with_texmf(rel: &str, prefix: &str, sub: &str) -> bool {
    folded_prefix(rel, &format!("{}/{}/", prefix, sub))
}
