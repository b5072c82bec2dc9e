//! Prompt composition.
//!
//! A [`PromptTemplate`] holds instruction text with exactly one
//! `{context_str}` placeholder followed by exactly one `{query_str}`
//! placeholder. [`PromptTemplate::compose`] joins the retrieved chunk texts
//! into the context block and splices context and query into the template in
//! a single pass, so braces inside documents or questions are never treated
//! as placeholders.

use crate::error::PromptError;
use crate::models::ScoredChunk;

pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";
pub const QUERY_PLACEHOLDER: &str = "{query_str}";

/// Separator placed between chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Fields requested by [`PromptTemplate::with_answer_fields`] when none are
/// configured.
pub const DEFAULT_ANSWER_FIELDS: &[&str] = &[
    "Title",
    "Topic",
    "Type of questions",
    "Origin: Book Title and page details",
    "ID: Book ID",
];

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
    context_at: usize,
    query_at: usize,
}

impl PromptTemplate {
    /// Parse a template, checking placeholder count and order.
    pub fn new(text: impl Into<String>) -> Result<Self, PromptError> {
        let text = text.into();
        let context_at = find_once(&text, CONTEXT_PLACEHOLDER)?;
        let query_at = find_once(&text, QUERY_PLACEHOLDER)?;
        if context_at > query_at {
            return Err(PromptError::PlaceholderOrder);
        }
        Ok(Self {
            text,
            context_at,
            query_at,
        })
    }

    /// The built-in question-answering template, asking for an answer laid
    /// out as the given enumerated fields.
    pub fn with_answer_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let mut text = String::from(
            "Your task is to answer all the questions that users ask based only on the context information provided below.\n\
             Please answer the question at length and in detail, with full meaning.\n\
             In the answer there is no sentence such as: based on the context provided.\n\
             Context information is below.\n\
             ------------------------------------------\n",
        );
        text.push_str(CONTEXT_PLACEHOLDER);
        text.push_str(
            "\n------------------------------------------\n\
             Given the context information and not prior knowledge, answer the query.\n\
             Query: ",
        );
        text.push_str(QUERY_PLACEHOLDER);
        text.push_str("\nAnswer:\n");
        if !fields.is_empty() {
            text.push_str("The answer should be in the following format:\n");
            for (i, field) in fields.iter().enumerate() {
                text.push_str(&format!("{}. {}\n", i + 1, field.as_ref()));
            }
        }

        let context_at = text.find(CONTEXT_PLACEHOLDER).unwrap_or_default();
        let query_at = text.find(QUERY_PLACEHOLDER).unwrap_or_default();
        Self {
            text,
            context_at,
            query_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Build the final prompt from retrieved chunks (in retrieval order) and
    /// the user's question.
    pub fn compose(&self, retrieved: &[ScoredChunk], query: &str) -> String {
        let context = build_context(retrieved);
        let ctx_end = self.context_at + CONTEXT_PLACEHOLDER.len();
        let query_end = self.query_at + QUERY_PLACEHOLDER.len();

        let mut out = String::with_capacity(self.text.len() + context.len() + query.len());
        out.push_str(&self.text[..self.context_at]);
        out.push_str(&context);
        out.push_str(&self.text[ctx_end..self.query_at]);
        out.push_str(query);
        out.push_str(&self.text[query_end..]);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::with_answer_fields(DEFAULT_ANSWER_FIELDS)
    }
}

/// Concatenate chunk texts in retrieval order.
pub fn build_context(retrieved: &[ScoredChunk]) -> String {
    retrieved
        .iter()
        .map(|s| s.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn find_once(text: &str, placeholder: &'static str) -> Result<usize, PromptError> {
    let first = text
        .find(placeholder)
        .ok_or(PromptError::MissingPlaceholder(placeholder))?;
    if text[first + placeholder.len()..].contains(placeholder) {
        return Err(PromptError::DuplicatePlaceholder(placeholder));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn scored(text: &str, distance: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: text.to_string(),
                document_id: "d".to_string(),
                chunk_index: 0,
                text: text.to_string(),
                token_start: 0,
                token_count: 1,
                hash: String::new(),
            },
            distance,
        }
    }

    #[test]
    fn test_compose_context_before_query() {
        let tpl = PromptTemplate::default();
        let chunks = vec![scored(r#"{"title":"A"}"#, 0.1), scored(r#"{"title":"B"}"#, 0.2)];
        let prompt = tpl.compose(&chunks, "Which titles exist?");
        let context = build_context(&chunks);
        assert_eq!(context, "{\"title\":\"A\"}\n\n{\"title\":\"B\"}");

        let c = prompt.find(&context).unwrap();
        let q = prompt.find("Which titles exist?").unwrap();
        assert!(c < q);
        assert_eq!(prompt.matches(&context).count(), 1);
        assert_eq!(prompt.matches("Which titles exist?").count(), 1);
        assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
        assert!(!prompt.contains(QUERY_PLACEHOLDER));
    }

    #[test]
    fn test_placeholders_in_input_not_expanded() {
        let tpl = PromptTemplate::new("C: {context_str} Q: {query_str}").unwrap();
        let prompt = tpl.compose(&[scored("has {query_str} inside", 0.0)], "and {context_str}?");
        assert_eq!(prompt, "C: has {query_str} inside Q: and {context_str}?");
    }

    #[test]
    fn test_default_template_lists_fields() {
        let tpl = PromptTemplate::default();
        assert!(tpl.as_str().contains("5. ID: Book ID"));
        assert!(tpl.as_str().contains("based on the context provided"));
        let custom = PromptTemplate::with_answer_fields(&["Name", "ID"]);
        assert!(custom.as_str().contains("1. Name\n2. ID\n"));
        assert!(PromptTemplate::new(custom.as_str()).is_ok());
    }

    #[test]
    fn test_no_fields_omits_format_block() {
        let tpl = PromptTemplate::with_answer_fields::<&str>(&[]);
        assert!(!tpl.as_str().contains("following format"));
    }

    #[test]
    fn test_empty_retrieval_still_has_query() {
        let tpl = PromptTemplate::new("[{context_str}] {query_str}").unwrap();
        assert_eq!(tpl.compose(&[], "q"), "[] q");
    }

    #[test]
    fn test_template_validation() {
        assert_eq!(
            PromptTemplate::new("only {query_str}").unwrap_err(),
            PromptError::MissingPlaceholder(CONTEXT_PLACEHOLDER)
        );
        assert_eq!(
            PromptTemplate::new("{context_str}").unwrap_err(),
            PromptError::MissingPlaceholder(QUERY_PLACEHOLDER)
        );
        assert_eq!(
            PromptTemplate::new("{context_str}{context_str}{query_str}").unwrap_err(),
            PromptError::DuplicatePlaceholder(CONTEXT_PLACEHOLDER)
        );
        assert_eq!(
            PromptTemplate::new("{query_str} then {context_str}").unwrap_err(),
            PromptError::PlaceholderOrder
        );
    }
}
