//! Whitespace and extraction-artifact cleanup for page text.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static CARRIAGE_RETURNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r\n?").unwrap());
static INVISIBLE_MARKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{00AD}\u{200B}-\u{200D}\u{FEFF}]").unwrap());
static HYPHEN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<lead>\w)-\n(?P<trail>\w)").unwrap());
static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static EXCESS_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Clean raw extracted text into the canonical form the splitter receives.
///
/// Converts Windows and legacy Mac line endings to `\n`, strips soft hyphens
/// and zero-width marks left behind by PDF extractors, re-joins words that
/// were hyphenated across a line break, collapses runs of blank lines to a
/// single blank line and runs of spaces to one space, and trims the result.
///
/// The cleanup is idempotent: feeding its output back in returns the same
/// string, so callers never need to track whether text was already cleaned.
pub fn normalize(raw: &str) -> String {
    let text = CARRIAGE_RETURNS.replace_all(raw, "\n");
    let text = INVISIBLE_MARKS.replace_all(&text, "");
    let text = join_hyphen_breaks(&text);
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    let text = EXCESS_SPACES.replace_all(&text, " ");
    text.trim().to_string()
}

/// Non-overlapping replacement can leave a junction behind when a fragment
/// is a single character ("a-\nb-\nc"), so the rewrite repeats until stable.
fn join_hyphen_breaks(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        match HYPHEN_BREAK.replace_all(&current, "$lead$trail") {
            Cow::Borrowed(_) => return current,
            Cow::Owned(next) => current = next,
        }
    }
}
