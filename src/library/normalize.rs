//! Text canonicalization for title matching and file naming.

use unicode_normalization::UnicodeNormalization;

/// Maximum length (in characters) of a sanitized file name
pub const MAX_FILENAME_CHARS: usize = 150;

/// Characters that are not allowed in file names on common platforms
const ILLEGAL_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Canonicalize free text for matching.
///
/// Applies NFKD decomposition, lowercases, drops everything that is neither
/// a word character nor whitespace (this also drops the combining marks
/// left over from decomposition), collapses whitespace runs and trims.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .nfkd()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`normalize`] for possibly missing values; `None` yields an empty string
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Make a title safe to use as a file name.
///
/// Keeps case, turns each of `/ \ : * ? " < > |` into a space, collapses
/// whitespace runs to one space and truncates to [`MAX_FILENAME_CHARS`].
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if ILLEGAL_FILENAME_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();

    truncated.trim_end().to_string()
}
