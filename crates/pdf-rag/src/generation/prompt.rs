//! Prompt templates for grounded answer generation

use crate::error::{Error, Result};
use crate::types::RetrievalResult;

/// Context used when retrieval returned nothing
pub const NO_CONTEXT_PLACEHOLDER: &str = "No relevant context found.";

/// Separator between retrieved segments in the context block
pub const SEGMENT_SEPARATOR: &str = "\n\n";

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Zephyr chat format with an instruction not to invent answers
const ZEPHYR_TEMPLATE: &str = r#"<|system|>
You are a helpful AI assistant. Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
</s>
<|user|>
Context:
{context}

Question:
{question}
</s>
<|assistant|>
"#;

/// Fixed prompt skeleton with `{context}` and `{question}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template; both slots must appear
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(Error::Config(format!("Prompt template is missing the {} slot", slot)));
            }
        }
        Ok(Self { template })
    }

    /// The Zephyr-formatted grounding template
    pub fn zephyr() -> Self {
        Self {
            template: ZEPHYR_TEMPLATE.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fill the slots in a single pass, so slot-like text inside the
    /// context or question is left alone
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        loop {
            let next_context = rest.find(CONTEXT_SLOT).map(|i| (i, CONTEXT_SLOT, context));
            let next_question = rest.find(QUESTION_SLOT).map(|i| (i, QUESTION_SLOT, question));

            let next = match (next_context, next_question) {
                (Some(c), Some(q)) => Some(if c.0 < q.0 { c } else { q }),
                (c, q) => c.or(q),
            };

            match next {
                Some((pos, slot, value)) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(value);
                    rest = &rest[pos + slot.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::zephyr()
    }
}

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Context block: segment texts in retrieval order, blank-line separated
    pub fn build_context(retrieved: &RetrievalResult) -> String {
        if retrieved.is_empty() {
            return NO_CONTEXT_PLACEHOLDER.to_string();
        }
        retrieved.texts().collect::<Vec<_>>().join(SEGMENT_SEPARATOR)
    }

    /// Merge retrieved context and question into a model-ready prompt
    pub fn assemble(question: &str, retrieved: &RetrievalResult, template: &PromptTemplate) -> String {
        template.render(&Self::build_context(retrieved), question.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScoredSegment, Segment};
    use uuid::Uuid;

    fn retrieved(texts: &[&str]) -> RetrievalResult {
        RetrievalResult::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| ScoredSegment {
                    segment: Segment::new(Uuid::nil(), i as u32, t.to_string(), 0, t.len()),
                    score: 0.9 - i as f32 * 0.1,
                })
                .collect(),
        )
    }

    #[test]
    fn test_assemble_in_retrieval_order() {
        let prompt = PromptBuilder::assemble(
            "What is the total?",
            &retrieved(&["The total is 42.", "Taxes are 8."]),
            &PromptTemplate::default(),
        );

        assert!(prompt.contains("Context:\nThe total is 42.\n\nTaxes are 8.\n"));
        assert!(prompt.contains("Question:\nWhat is the total?\n</s>"));
        assert!(prompt.starts_with("<|system|>"));
        assert!(prompt.contains("just say that you don't know"));
    }

    #[test]
    fn test_empty_retrieval_uses_placeholder() {
        let prompt = PromptBuilder::assemble("Anything?", &RetrievalResult::empty(), &PromptTemplate::default());
        assert!(prompt.contains(NO_CONTEXT_PLACEHOLDER));
    }

    #[test]
    fn test_slot_text_in_context_not_substituted() {
        let template = PromptTemplate::new("C: {context} Q: {question}").unwrap();
        let prompt = template.render("see {question} below", "why?");
        assert_eq!(prompt, "C: see {question} below Q: why?");
    }

    #[test]
    fn test_template_requires_slots() {
        assert!(PromptTemplate::new("no slots here").is_err());
        assert!(PromptTemplate::new("{context} only").is_err());
    }
}
