use crate::models::ConversationTurn;

/// Number of past turns handed to the response generator.
pub const HISTORY_WINDOW: usize = 3;

/// Conversation history for one chat session, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    turns: Vec<ConversationTurn>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, query: impl Into<String>, response: impl Into<String>) {
        self.turns.push(ConversationTurn {
            query: query.into(),
            response: response.into(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
