//! Default content policy.

use crate::message::{domain::MessageContent, ports::ContentPolicy};

/// Content policy rejecting empty text and, optionally, oversized text.
///
/// # Examples
///
/// ```
/// use chat_relay::message::domain::MessageContent;
/// use chat_relay::message::policy::DefaultContentPolicy;
/// use chat_relay::message::ports::ContentPolicy;
///
/// let policy = DefaultContentPolicy::new().with_max_chars(5);
/// assert!(policy.accept(&MessageContent::new("hello")));
/// assert!(!policy.accept(&MessageContent::new("  \n ")));
/// assert!(!policy.accept(&MessageContent::new("hello!")));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultContentPolicy {
    max_chars: Option<usize>,
}

impl DefaultContentPolicy {
    /// Creates a policy that only rejects empty content.
    #[must_use]
    pub const fn new() -> Self {
        Self { max_chars: None }
    }

    /// Rejects content longer than `max_chars` characters.
    #[must_use]
    pub const fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    /// Returns the configured character limit.
    #[must_use]
    pub const fn max_chars(&self) -> Option<usize> {
        self.max_chars
    }
}

impl ContentPolicy for DefaultContentPolicy {
    fn accept(&self, content: &MessageContent) -> bool {
        if content.is_empty() {
            return false;
        }
        self.max_chars
            .is_none_or(|limit| content.char_count() <= limit)
    }
}
