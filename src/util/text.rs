use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("HTML tag pattern is valid"));

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

/// Removes HTML tags and `http(s)://` URLs from feed text.
///
/// Tags are removed before URLs, so a link inside an attribute disappears with
/// its tag. Entities (`&amp;`) are left untouched.
///
/// Returns `Cow::Borrowed` when the text contains neither `<` nor `http`, which
/// is the common case for plain feed titles.
///
/// # Examples
///
/// ```
/// use fastrss::util::strip_markup;
///
/// assert_eq!(strip_markup("<b>GPT-4</b> is out"), "GPT-4 is out");
/// assert_eq!(strip_markup("see https://example.com/x now"), "see  now");
/// ```
pub fn strip_markup(text: &str) -> Cow<'_, str> {
    if !text.contains('<') && !text.contains("http") {
        return Cow::Borrowed(text);
    }

    let without_tags = HTML_TAG.replace_all(text, "");
    if !HTTP_URL.is_match(&without_tags) {
        return without_tags;
    }
    Cow::Owned(HTTP_URL.replace_all(&without_tags, "").into_owned())
}
