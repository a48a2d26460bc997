//! Strip markdown wrapping from oracle answers.
//!
//! Three shapes are recognised, checked in this order:
//!
//! 1. a fenced block (```` ``` ```` with an optional language tag), anywhere
//!    in the text; the first well-formed one wins and surrounding prose is
//!    dropped;
//! 2. the whole answer wrapped in `'''`;
//! 3. the whole answer wrapped in `"""`.
//!
//! Anything else passes through trimmed. Answers with several fenced blocks
//! or unbalanced delimiters get whatever the first rule that matches yields.

const FENCE: &str = "```";
const SINGLE_QUOTES: &str = "'''";
const DOUBLE_QUOTES: &str = "\"\"\"";

pub fn strip_markdown(text: &str) -> String {
    if let Some(inner) = fenced_block(text) {
        return inner.trim().to_string();
    }
    for delim in [SINGLE_QUOTES, DOUBLE_QUOTES] {
        if let Some(inner) = quoted_wrapper(text, delim) {
            return inner.trim().to_string();
        }
    }
    text.trim().to_string()
}

/// Inner text of the first ```` ```lang\n ... ``` ```` block.
fn fenced_block(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(FENCE) {
        let open = search_from + offset;
        let after_fence = open + FENCE.len();
        let rest = &text[after_fence..];

        let tag_len = rest
            .find(|c: char| !is_tag_char(c))
            .unwrap_or(rest.len());
        let after_tag = &rest[tag_len..];
        let newline_len = if after_tag.starts_with("\r\n") {
            2
        } else if after_tag.starts_with('\n') {
            1
        } else {
            // Not an opening fence; keep looking past it.
            search_from = after_fence;
            continue;
        };

        let body_start = after_fence + tag_len + newline_len;
        let close = text[body_start..].find(FENCE)?;
        return Some(&text[body_start..body_start + close]);
    }
    None
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '#' | '-')
}

/// Inner text when the trimmed answer is exactly `delim ... delim` with no
/// other occurrence of `delim` inside.
fn quoted_wrapper<'a>(text: &'a str, delim: &str) -> Option<&'a str> {
    let trimmed = text.trim();
    if trimmed.len() < delim.len() * 2 {
        return None;
    }
    let inner = trimmed.strip_prefix(delim)?.strip_suffix(delim)?;
    if inner.contains(delim) {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through_trimmed() {
        assert_eq!(strip_markdown("  print('hi')\n\n"), "print('hi')");
    }

    #[test]
    fn fenced_python_block() {
        assert_eq!(
            strip_markdown("```python\nprint('hi')\nx = 1\n```"),
            "print('hi')\nx = 1"
        );
    }

    #[test]
    fn fenced_block_without_tag() {
        assert_eq!(strip_markdown("```\nexit 0\n```\n"), "exit 0");
    }

    #[test]
    fn fenced_block_with_surrounding_prose() {
        let answer = "Here is the corrected script:\n\n```py\nimport os\n```\n\nIt now imports os.";
        assert_eq!(strip_markdown(answer), "import os");
    }

    #[test]
    fn fenced_block_with_crlf() {
        assert_eq!(strip_markdown("```python\r\nx = 1\r\n```"), "x = 1");
    }

    #[test]
    fn inline_fence_is_not_a_block() {
        // "```x = 1```" has no newline after the tag, so it is not an opener.
        assert_eq!(strip_markdown("```x = 1```"), "```x = 1```");
    }

    #[test]
    fn triple_single_quote_wrapper() {
        assert_eq!(strip_markdown("'''\nx = 1\n'''"), "x = 1");
    }

    #[test]
    fn triple_double_quote_wrapper() {
        assert_eq!(strip_markdown("\"\"\"\nx = 1\n\"\"\""), "x = 1");
    }

    #[test]
    fn docstrings_inside_code_are_kept() {
        let code = "def f():\n    \"\"\"Return one.\"\"\"\n    return 1";
        assert_eq!(strip_markdown(code), code);
    }

    #[test]
    fn fenced_code_keeps_its_docstrings() {
        let answer = "```python\ndef f():\n    '''doc'''\n    return 1\n```";
        assert_eq!(strip_markdown(answer), "def f():\n    '''doc'''\n    return 1");
    }

    #[test]
    fn idempotent_on_clean_input() {
        for input in [
            "x = 1",
            "  spaced  \n",
            "```python\nprint(1)\n```",
            "'''\nwrapped\n'''",
            "a '''b''' c",
            "",
        ] {
            let once = strip_markdown(input);
            assert_eq!(strip_markdown(&once), once, "not idempotent for {input:?}");
        }
    }
}
