//! Boundary validation and sanitisation, implementing spec §6 verbatim:
//! room code / nickname / message content rules plus a small profanity
//! heuristic. Hand-rolled rather than regex-based — the rules are simple
//! character-class checks and the corpus doesn't reach for `regex` for
//! this shape of problem.

const PROFANITY_LIST: &[&str] = &["damn", "hell", "crap"];
const MIN_AFFIX_LEN: usize = 3;

pub fn normalize_room_code(raw: &str) -> Result<String, String> {
    if raw.is_empty() || raw.chars().count() > 50 {
        return Err("room code must be 1-50 characters".to_owned());
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err("room code may only contain letters, digits, '-' and '_'".to_owned());
    }
    Ok(raw.to_ascii_lowercase())
}

pub fn validate_nickname(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 30 {
        return Err("nickname must be 1-30 characters".to_owned());
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_')
    {
        return Err("nickname may only contain letters, digits, spaces, '-' and '_'".to_owned());
    }
    if contains_profanity(trimmed) {
        return Err("nickname is not allowed".to_owned());
    }
    Ok(escape_markup(trimmed))
}

pub fn validate_message_content(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 500 {
        return Err("message must be 1-500 characters".to_owned());
    }
    Ok(escape_markup(trimmed))
}

fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Exact match, plus a prefix/suffix stem match for stems at least
/// `MIN_AFFIX_LEN` characters long, so e.g. "hello" isn't blocked by "hell"
/// matching only the first three letters of a five-letter word.
fn contains_profanity(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    lowered.split_whitespace().any(|word| {
        PROFANITY_LIST.iter().any(|&bad| {
            if word == bad {
                return true;
            }
            if bad.len() < MIN_AFFIX_LEN {
                return false;
            }
            (word.starts_with(bad) || word.ends_with(bad)) && word.len() >= bad.len() + 2
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_room_code_lowercases_and_accepts_alnum_dash_underscore() {
        assert_eq!(normalize_room_code("Demo-Room_1").unwrap(), "demo-room_1");
    }

    #[test]
    fn normalize_room_code_rejects_empty_and_overlong_and_bad_chars() {
        assert!(normalize_room_code("").is_err());
        assert!(normalize_room_code(&"a".repeat(51)).is_err());
        assert!(normalize_room_code("demo room").is_err());
    }

    #[test]
    fn validate_nickname_trims_and_escapes_markup() {
        assert_eq!(validate_nickname("  alice  ").unwrap(), "alice");
        assert_eq!(validate_nickname("<b>bob</b>").is_err(), true);
    }

    #[test]
    fn validate_nickname_rejects_profanity_exact_and_affix_matches() {
        assert!(validate_nickname("damn").is_err());
        assert!(validate_nickname("damnit").is_err());
        assert!(validate_nickname("godhell").is_err());
        assert!(validate_nickname("hello").is_ok());
    }

    #[test]
    fn validate_message_content_rejects_blank_and_overlong() {
        assert!(validate_message_content("   ").is_err());
        assert!(validate_message_content(&"a".repeat(501)).is_err());
        assert!(validate_message_content("nice pass").is_ok());
    }

    #[test]
    fn validate_message_content_escapes_markup() {
        assert_eq!(
            validate_message_content("<script>").unwrap(),
            "&lt;script&gt;"
        );
    }
}
