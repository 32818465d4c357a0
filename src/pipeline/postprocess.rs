//! Post-processing: deterministic cleanup of LLM-generated Markdown.
//!
//! Even with a strict prompt, models occasionally wrap their answer in a
//! ` ```markdown ` fence, emit CRLF line endings, pad the output with blank
//! lines, or glue a `<hr />` document separator onto the preceding
//! paragraph. Each rule here is a pure `&str → String` pass; they run in
//! a fixed order:
//!
//! 1. Strip an outer markdown fence
//! 2. Normalise line endings (CRLF / CR → LF)
//! 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
//! 4. Trim trailing whitespace per line
//! 5. Put document separators (`<hr />`, `<!-- file: … -->`) on their own
//!    paragraph
//! 6. Collapse 3+ consecutive blank lines down to 2
//! 7. End with exactly one newline

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every post-processing rule to raw LLM output.
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = isolate_separators(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1 ───────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2 ───────────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3 ───────────────────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 4 ───────────────────────────────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5 ───────────────────────────────────────────────────────────────────
//
// `<hr />` inside a paragraph renders inline in some viewers and is easy for
// a reader to miss. Surround every separator with blank lines.

static RE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]*(<hr\s*/?>|<!--\s*file:[^>]*-->)[ \t]*").unwrap()
});

fn isolate_separators(input: &str) -> String {
    RE_SEPARATOR.replace_all(input, "\n\n$1\n\n").to_string()
}

// ── Rule 6 ───────────────────────────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 7 ───────────────────────────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_matches('\n');
    if trimmed.trim().is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n# Hi\nthere\n```"), "# Hi\nthere");
        assert_eq!(strip_markdown_fences("```\n# Hi\n```"), "# Hi");
        assert_eq!(strip_markdown_fences("# Hi"), "# Hi");
    }

    #[test]
    fn inner_code_blocks_survive() {
        let input = "# Title\n\n```rust\nfn main() {}\n```\n\nEnd";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn invisible_chars() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn separator_gets_own_paragraph() {
        let out = clean_markdown("end of A <hr /> # Doc B");
        assert_eq!(out, "end of A\n\n<hr />\n\n# Doc B\n");
    }

    #[test]
    fn comment_separator_gets_own_paragraph() {
        let out = clean_markdown("one\n<!-- file: b.pdf -->\ntwo");
        assert_eq!(out, "one\n\n<!-- file: b.pdf -->\n\ntwo\n");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(clean_markdown("  \n\n  "), "");
    }

    #[test]
    fn full_pipeline() {
        let input = "```markdown\r\n# Title   \r\n\r\n\r\n\r\nBody\u{200B}\r\n```";
        assert_eq!(clean_markdown(input), "# Title\n\nBody\n");
    }
}
