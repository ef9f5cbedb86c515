//! Name normalisation
//!
//! Canonical string form used everywhere names are compared: athlete matching,
//! result deduplication and substring candidate search all operate on the
//! output of [`normalize_name`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalise a display name into its canonical comparison form.
///
/// Lowercase, Unicode NFD, strip combining marks, strip everything that is
/// neither alphanumeric nor whitespace, collapse runs of whitespace to a
/// single space. Idempotent.
pub fn normalize_name(name: &str) -> String {
    let stripped: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
