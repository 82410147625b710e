use std::borrow::Cow;

/// Byte index of the `max_chars`-th character, or the string length.
#[inline]
fn char_boundary(s: &str, max_chars: usize) -> usize {
    s.char_indices()
        .nth(max_chars)
        .map(|(index, _)| index)
        .unwrap_or(s.len())
}

pub fn abbreviate(text: &str, max_chars: usize) -> &str {
    &text[..char_boundary(text, max_chars)]
}

/// Like [`abbreviate`], but marks a cut with a trailing `...`.
pub fn ellipsize(text: &str, max_chars: usize) -> Cow<'_, str> {
    let cut = abbreviate(text, max_chars);
    if cut.len() == text.len() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}...", cut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviate_counts_characters_not_bytes() {
        assert_eq!(abbreviate("酷安动态内容", 2), "酷安");
        assert_eq!(abbreviate("short", 64), "short");
        assert_eq!(abbreviate("", 3), "");
    }

    #[test]
    fn ellipsize_only_marks_cut_text() {
        assert_eq!(ellipsize("hello", 5), "hello");
        assert_eq!(ellipsize("hello world", 5), "hello...");
        assert_eq!(ellipsize("一二三四", 3), "一二三...");
    }
}
