//! Prompt-context formatting for the summarization collaborator.
//!
//! Pure string building: no I/O, no external calls.

use crate::models::RankedDocument;

/// Instruction appended after the document blocks so the consuming
/// summarizer cites sources in a renderable way.
const CITATION_SUFFIX: &str = "When you mention a document title, format it as \
<a href=\"url\" target=\"_blank\">title</a> using that document's url, and add a short \
explanation of why it is the closest match. Never print a raw url on its own.";

/// Format ranked documents into a single context block for the summarizer.
///
/// Each document contributes its title, content, and identifier; the fixed
/// citation instruction is appended last.
pub fn build_context(ranked: &[RankedDocument]) -> String {
    let mut context = String::new();

    for doc in ranked {
        context.push_str(" - Title: ");
        context.push_str(doc.row.title());
        context.push_str(" - Content: ");
        context.push_str(doc.row.content());
        context.push_str(" - url (do not print directly): ");
        context.push_str(doc.row.url());
        context.push_str("\n\n");
    }

    context.push_str(CITATION_SUFFIX);
    context
}

/// Shorten `text` for display: first and last `num_words` words around an
/// ellipsis. Text at most `2 × num_words` words long is returned unchanged.
pub fn condense_content(text: &str, num_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > num_words * 2 {
        format!(
            "{} ... {}",
            words[..num_words].join(" "),
            words[words.len() - num_words..].join(" ")
        )
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CorpusRow, COL_CONTENT, COL_TITLE, COL_URL_THESE};

    fn make_ranked(title: &str, content: &str, url: &str) -> RankedDocument {
        let mut row = CorpusRow::default();
        row.fields.insert(COL_TITLE.into(), title.into());
        row.fields.insert(COL_CONTENT.into(), content.into());
        row.fields.insert(COL_URL_THESE.into(), url.into());
        RankedDocument { row, score: 1.0 }
    }

    #[test]
    fn test_context_contains_each_document_and_suffix() {
        let ranked = vec![
            make_ranked("Alpha", "about graphs", "https://t/1"),
            make_ranked("Beta", "about embeddings", "https://t/2"),
        ];
        let context = build_context(&ranked);
        assert!(context.contains("Alpha"));
        assert!(context.contains("about embeddings"));
        assert!(context.contains("https://t/2"));
        assert!(context.ends_with(CITATION_SUFFIX));
    }

    #[test]
    fn test_empty_results_still_carry_instructions() {
        let context = build_context(&[]);
        assert_eq!(context, CITATION_SUFFIX);
    }

    #[test]
    fn test_condense_short_text_untouched() {
        assert_eq!(condense_content("just a few words", 10), "just a few words");
    }

    #[test]
    fn test_condense_long_text_ellipsized() {
        let text = (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let condensed = condense_content(&text, 3);
        assert_eq!(condensed, "0 1 2 ... 27 28 29");
    }
}
