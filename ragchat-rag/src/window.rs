//! Bounded conversation memory rendered into the answer prompt.
//!
//! [`ConversationWindow`] keeps the most recent question/answer pairs and
//! renders them into a delimited block whose length never exceeds
//! `max_chars - 30` characters. The budget is split evenly between the pairs
//! currently held; a pair whose segment does not fit its share is cut and
//! marked with an ellipsis. Shares are not rebalanced after truncation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Characters held back from `max_chars` for the surrounding prompt.
const RESERVED_CHARS: usize = 30;
const HEADER: &str = "Last questions:\n\n --- \n";
const FOOTER: &str = " --- \n";
/// Appended to a truncated segment. Five characters.
const ELLIPSIS: &str = "...\n\n";
/// Appended to a segment that fits its share.
const SEPARATOR: &str = "\n\n";
/// Smallest share a pair may get before truncation becomes meaningless.
const MIN_SEGMENT_CHARS: usize = 20;

/// One completed exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaPair {
    /// The user's question.
    pub question: String,
    /// The answer that was streamed back.
    pub answer: String,
}

impl QaPair {
    /// Create a pair.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// The last `capacity` question/answer pairs of a conversation.
///
/// Each window owns its own history; create one per session.
///
/// # Example
///
/// ```rust
/// use ragchat_rag::ConversationWindow;
///
/// let mut window = ConversationWindow::default();
/// assert_eq!(window.render(), "");
///
/// window.add("What is Rust?", "A systems programming language.");
/// assert!(window.render().contains("Question 1:\nWhat is Rust?"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationWindow {
    pairs: VecDeque<QaPair>,
    capacity: usize,
    max_chars: usize,
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self { pairs: VecDeque::new(), capacity: 3, max_chars: 5000 }
    }
}

impl ConversationWindow {
    /// Create an empty window holding up to `capacity` pairs rendered within
    /// `max_chars - 30` characters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `capacity` is zero or `max_chars`
    /// leaves too little room for one segment per pair.
    pub fn new(capacity: usize, max_chars: usize) -> Result<Self> {
        Self::check_limits(capacity, max_chars)?;
        Ok(Self { pairs: VecDeque::with_capacity(capacity + 1), capacity, max_chars })
    }

    pub(crate) fn check_limits(capacity: usize, max_chars: usize) -> Result<()> {
        if capacity == 0 {
            return Err(RagError::ConfigError("history size must be greater than zero".into()));
        }
        let wrapper = HEADER.chars().count() + FOOTER.chars().count();
        let minimum = RESERVED_CHARS + wrapper + capacity * (MIN_SEGMENT_CHARS + ELLIPSIS.len());
        if max_chars < minimum {
            return Err(RagError::ConfigError(format!(
                "history budget of {max_chars} characters is below the minimum of {minimum} \
                 for {capacity} pairs"
            )));
        }
        Ok(())
    }

    /// Record a completed exchange, evicting the oldest pair beyond capacity.
    pub fn add(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.pairs.push_back(QaPair::new(question, answer));
        while self.pairs.len() > self.capacity {
            self.pairs.pop_front();
        }
    }

    /// Pairs currently held, oldest first.
    pub fn pairs(&self) -> impl Iterator<Item = &QaPair> {
        self.pairs.iter()
    }

    /// Number of pairs held.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair has been recorded.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Maximum number of pairs held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Upper bound on [`render`](Self::render) output, in characters.
    pub fn render_budget(&self) -> usize {
        self.max_chars.saturating_sub(RESERVED_CHARS)
    }

    /// Forget every pair.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Render the pairs for prompt inclusion, or `""` when empty.
    pub fn render(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }

        let wrapper = HEADER.chars().count() + FOOTER.chars().count();
        let body_budget = self.render_budget().saturating_sub(wrapper);
        let share = body_budget / self.pairs.len();
        let limit = share.saturating_sub(ELLIPSIS.len());

        let mut out = String::from(HEADER);
        for (i, pair) in self.pairs.iter().enumerate() {
            let n = i + 1;
            let segment =
                format!("Question {n}:\n{}\n\nAnswer {n}:\n{}", pair.question, pair.answer);
            if segment.chars().count() > limit {
                out.extend(segment.chars().take(limit));
                out.push_str(ELLIPSIS);
            } else {
                out.push_str(&segment);
                out.push_str(SEPARATOR);
            }
        }
        out.push_str(FOOTER);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_renders_nothing() {
        assert_eq!(ConversationWindow::default().render(), "");
    }

    #[test]
    fn evicts_oldest_pair_first() {
        let mut window = ConversationWindow::new(2, 5000).unwrap();
        window.add("q1", "a1");
        window.add("q2", "a2");
        window.add("q3", "a3");

        let questions: Vec<&str> = window.pairs().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, vec!["q2", "q3"]);
    }

    #[test]
    fn renders_pairs_in_order_with_labels() {
        let mut window = ConversationWindow::default();
        window.add("first?", "one");
        window.add("second?", "two");

        let rendered = window.render();
        let first = rendered.find("Question 1:\nfirst?\n\nAnswer 1:\none").unwrap();
        let second = rendered.find("Question 2:\nsecond?\n\nAnswer 2:\ntwo").unwrap();
        assert!(first < second);
        assert!(rendered.starts_with(HEADER));
        assert!(rendered.ends_with(FOOTER));
    }

    #[test]
    fn long_pairs_are_truncated_per_share() {
        let mut window = ConversationWindow::new(2, 300).unwrap();
        window.add("short", "fine");
        window.add("long", "x".repeat(1000));

        let rendered = window.render();
        assert!(rendered.chars().count() <= 270);
        assert!(rendered.contains("Answer 1:\nfine\n\n"));
        assert!(rendered.contains("x...\n\n"));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let mut window = ConversationWindow::new(1, 200).unwrap();
        window.add("ü", "ü".repeat(500));
        assert!(window.render().chars().count() <= 170);
    }

    #[test]
    fn rejects_unusable_limits() {
        assert!(ConversationWindow::new(0, 5000).is_err());
        assert!(ConversationWindow::new(3, 60).is_err());
    }
}
