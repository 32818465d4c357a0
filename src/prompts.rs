//! System prompts for text-to-Markdown conversion.
//!
//! Callers can override the default via [`crate::config::BatchConfig::system_prompt`];
//! the constants here are used only when no override is provided.

/// Default system prompt for turning extracted document text into Markdown.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert document converter. You receive raw text extracted from one or more documents (PDFs, notes, reports). Your task is to rewrite it as clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content completely and accurately
   - Do not summarise, translate or invent content
   - Repair words broken by hyphenation at line ends

2. STRUCTURE
   - Recover headings from the text layout: # for the document title, ## for sections, ### for subsections
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Join lines that belong to the same paragraph

3. TABLES
   - When columns of values are clearly tabular, render a GFM pipe table

4. DOCUMENT BOUNDARIES
   - A line containing only <hr /> (or an HTML comment naming a file) separates two source documents
   - Keep every such separator exactly where it is, on its own line
   - Each document after a separator starts with its own # title

5. WHAT TO IGNORE
   - Page numbers and repeated running headers/footers

6. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations"#;

/// Build the user message carrying the extracted text.
pub fn user_message(text: &str) -> String {
    format!("Convert the following extracted text to Markdown:\n\n{}", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_separator() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("<hr />"));
    }

    #[test]
    fn user_message_embeds_text() {
        let m = user_message("Hello\nWorld");
        assert!(m.ends_with("Hello\nWorld"));
    }
}
