//! Character-safe text truncation for previews

/// First `max_chars` characters of `text` (never splits a UTF-8 sequence)
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// `text` cut to `max_chars` characters, with `…` appended when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let head = take_chars(text, max_chars);
    if head.len() < text.len() {
        format!("{}…", head)
    } else {
        head.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_chars_respects_char_boundaries() {
        assert_eq!(take_chars("mötesanteckningar", 3), "möt");
        assert_eq!(take_chars("kort", 10), "kort");
        assert_eq!(take_chars("", 5), "");
    }

    #[test]
    fn test_preview_appends_ellipsis_only_when_cut() {
        assert_eq!(preview("abcdef", 4), "abcd…");
        assert_eq!(preview("abcd", 4), "abcd");
        assert_eq!(preview("åäöåäö", 3), "åäö…");
    }
}
