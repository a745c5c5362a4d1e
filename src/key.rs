//! Identity keys used to compare names across the candidate source and the
//! annotated list.
//!
//! A key is the trimmed scientific name and the trimmed authorship joined by
//! [`KEY_SEPARATOR`]. Missing components count as empty strings, so
//! `("Genus species", None)` and `("Genus species", Some(""))` share a key.
//!
//! Known limitation: the separator is `|`, which does not occur in scientific
//! names or authorship strings in practice. A name containing a literal `|`
//! could collide with a different (name, authorship) split, e.g.
//! `("a|b", "c")` and `("a", "b|c")`. Such inputs are not rejected.

/// Separator between the name and authorship components of a key.
pub const KEY_SEPARATOR: char = '|';

/// Canonical identity of a (name, authorship) pair. Case-sensitive.
pub fn identity_key(name: Option<&str>, authorship: Option<&str>) -> String {
    let name = name.map(str::trim).unwrap_or("");
    let authorship = authorship.map(str::trim).unwrap_or("");
    let mut key = String::with_capacity(name.len() + authorship.len() + 1);
    key.push_str(name);
    key.push(KEY_SEPARATOR);
    key.push_str(authorship);
    key
}
