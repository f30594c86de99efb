//! Prompt composition from retrieved chunks.

use crate::document::SearchResult;

const PREAMBLE: &str =
    "You are an expert assistant. Answer the question based only on the following context:";
const SEPARATOR: &str = "\n\n";

/// Formats retrieved chunks and a question into a generation prompt.
///
/// Chunks appear in retrieval order, most relevant first, separated by a
/// blank line. When the context would exceed `max_context_chars`, the
/// lowest-ranked chunks are dropped. A top chunk that alone exceeds the
/// budget is cut to fit rather than dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextComposer {
    max_context_chars: usize,
}

impl ContextComposer {
    /// Create a composer with the given context budget in characters.
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// The context budget in characters.
    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Build the prompt for `question` from `results`.
    pub fn compose(&self, question: &str, results: &[SearchResult]) -> String {
        let context = self.context(results);
        format!("{PREAMBLE}\n\n{context}\n\nQuestion: {question}\n")
    }

    /// Number of leading `results` that fit the budget.
    ///
    /// Never zero for non-empty `results`: an oversized top chunk still
    /// counts, since [`context`](Self::context) truncates it.
    pub fn fit(&self, results: &[SearchResult]) -> usize {
        let mut used = 0;
        for (i, result) in results.iter().enumerate() {
            let len = result.chunk.text.chars().count();
            let cost = if i == 0 { len } else { len + SEPARATOR.len() };
            if used + cost > self.max_context_chars {
                return i.max(1);
            }
            used += cost;
        }
        results.len()
    }

    /// The context section alone: the chunks that fit the budget.
    pub fn context(&self, results: &[SearchResult]) -> String {
        let kept = &results[..self.fit(results)];
        let mut context = String::new();
        for (i, result) in kept.iter().enumerate() {
            if i > 0 {
                context.push_str(SEPARATOR);
            }
            context.push_str(&result.chunk.text);
        }
        if context.chars().count() > self.max_context_chars {
            context = context.chars().take(self.max_context_chars).collect();
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn result(text: &str, score: f32) -> SearchResult {
        SearchResult { chunk: Chunk { document: "d".into(), sequence: 0, text: text.into() }, score }
    }

    #[test]
    fn prompt_keeps_retrieval_order() {
        let composer = ContextComposer::new(1000);
        let prompt =
            composer.compose("What is it?", &[result("first", 0.9), result("second", 0.5)]);
        assert_eq!(
            prompt,
            "You are an expert assistant. Answer the question based only on the following context:\n\n\
             first\n\nsecond\n\nQuestion: What is it?\n"
        );
    }

    #[test]
    fn lowest_ranked_chunks_are_dropped_first() {
        let composer = ContextComposer::new(12);
        let context =
            composer.context(&[result("aaaa", 0.9), result("bbbb", 0.8), result("cccc", 0.7)]);
        assert_eq!(context, "aaaa\n\nbbbb");
    }

    #[test]
    fn oversized_top_chunk_is_truncated() {
        let composer = ContextComposer::new(3);
        assert_eq!(composer.context(&[result("abcdef", 0.9), result("x", 0.1)]), "abc");
    }

    #[test]
    fn fit_counts_the_chunks_in_the_context() {
        let composer = ContextComposer::new(12);
        let results = [result("aaaa", 0.9), result("bbbb", 0.8), result("cccc", 0.7)];
        assert_eq!(composer.fit(&results), 2);
        assert_eq!(ContextComposer::new(3).fit(&results), 1);
        assert_eq!(ContextComposer::new(100).fit(&results), 3);
        assert_eq!(composer.fit(&[]), 0);
    }

    #[test]
    fn empty_results_give_empty_context() {
        let composer = ContextComposer::new(10);
        assert_eq!(composer.context(&[]), "");
    }
}
