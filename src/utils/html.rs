use std::collections::HashSet;

use crate::error::AppError;

/// Validates admin-entered content as plain text.
///
/// Clients render question text and options verbatim, so the stored value is
/// the trimmed input, with `<`, `>` and `&` left as typed. Input that ammonia
/// would change (tags, comments, `<script>`/`<style>` bodies) is rejected
/// instead of being silently rewritten.
pub fn clean_text(input: &str) -> Result<String, AppError> {
    let text = input.trim();
    if !text.contains('<') {
        return Ok(text.to_string());
    }

    // `&` is escaped first so entity-like text survives the HTML parse.
    let sanitized = ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(&text.replace('&', "&amp;"))
        .to_string();

    if unescape(&sanitized) != text.replace("\r\n", "\n").replace('\r', "\n") {
        tracing::warn!("Rejected markup in content: {:?}", text);
        return Err(AppError::BadRequest(
            "HTML markup is not allowed; write `<` followed by a space for comparisons".to_string(),
        ));
    }

    Ok(text.to_string())
}

/// Reverses the entity escaping ammonia applies to text nodes.
fn unescape(escaped: &str) -> String {
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_operators_round_trip() {
        assert_eq!(clean_text("2 < 3").unwrap(), "2 < 3");
        assert_eq!(clean_text("Is 5 > 3 & 2 < 4?").unwrap(), "Is 5 > 3 & 2 < 4?");
        assert_eq!(clean_text("x <= y && y >= z").unwrap(), "x <= y && y >= z");
        assert_eq!(clean_text("&lt; is the escape for <").unwrap(), "&lt; is the escape for <");
    }

    #[test]
    fn plain_text_is_kept_verbatim() {
        assert_eq!(
            clean_text("  Who wrote \"Hamlet\" & why?  ").unwrap(),
            "Who wrote \"Hamlet\" & why?"
        );
    }

    #[test]
    fn markup_is_rejected() {
        for input in ["<b>Paris</b>", "2 + 2<script>alert(1)</script>", "a<b", "<!-- hidden -->x"] {
            assert!(
                matches!(clean_text(input), Err(AppError::BadRequest(_))),
                "{:?} should be rejected",
                input
            );
        }
    }
}
