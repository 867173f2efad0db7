//! Conversation state for one instruction
//!
//! A [`Conversation`] is the ordered, append-only history the agent loop owns
//! while it works on a single instruction. It tracks which invocations of the
//! latest assistant turn still await a result and refuses results that do not
//! correlate with one of them.

mod types;

pub use types::{
    arguments_from_value, Content, ContentItem, ConversationMessage, Role, ToolInvocation,
    ToolResult, INVALID_ARGUMENTS_KEY,
};

use crate::error::{FerruleError, Result};

/// Message history for a single instruction.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
    /// Invocation ids of the latest assistant turn that have no result yet.
    outstanding: Vec<String>,
}

impl Conversation {
    /// Seed a conversation with a system prompt and the operator's instruction.
    ///
    /// # Example
    /// ```
    /// use ferrule::conversation::{Conversation, Role};
    ///
    /// let convo = Conversation::seeded("You must use tools.", "List the files");
    /// assert_eq!(convo.len(), 2);
    /// assert_eq!(convo.messages()[0].role, Role::System);
    /// ```
    pub fn seeded(system_prompt: &str, instruction: &str) -> Self {
        Self {
            messages: vec![
                ConversationMessage::system(system_prompt),
                ConversationMessage::user(instruction),
            ],
            outstanding: Vec::new(),
        }
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Consume the conversation, keeping only the transcript.
    pub fn into_messages(self) -> Vec<ConversationMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Invocation ids still waiting for a result.
    pub fn outstanding(&self) -> &[String] {
        &self.outstanding
    }

    /// Append an assistant turn. Its invocations become the outstanding set.
    ///
    /// The message is stored in canonical form (see
    /// [`ConversationMessage::into_canonical`]), the shape both wire codecs
    /// reproduce exactly.
    pub fn push_assistant(&mut self, message: ConversationMessage) -> Result<()> {
        if message.role != Role::Assistant {
            return Err(FerruleError::Protocol(format!(
                "expected an assistant message, got role '{}'",
                message.role
            )));
        }
        self.ensure_settled()?;
        let message = message.into_canonical();
        self.outstanding = message
            .invocations()
            .iter()
            .map(|inv| inv.id.clone())
            .collect();
        self.messages.push(message);
        Ok(())
    }

    /// Append a user message (nudge or operator redirect).
    pub fn push_user(&mut self, text: &str) -> Result<()> {
        self.ensure_settled()?;
        self.messages.push(ConversationMessage::user(text));
        Ok(())
    }

    /// Append a tool result for an outstanding invocation.
    ///
    /// Results whose id does not match an outstanding invocation of the
    /// immediately preceding assistant turn are rejected.
    pub fn push_tool_result(&mut self, result: &ToolResult) -> Result<()> {
        let Some(pos) = self
            .outstanding
            .iter()
            .position(|id| id == &result.invocation_id)
        else {
            return Err(FerruleError::Protocol(format!(
                "tool result '{}' does not match an outstanding invocation",
                result.invocation_id
            )));
        };
        self.outstanding.remove(pos);
        self.messages.push(result.to_message());
        Ok(())
    }

    fn ensure_settled(&self) -> Result<()> {
        if self.outstanding.is_empty() {
            Ok(())
        } else {
            Err(FerruleError::Protocol(format!(
                "{} tool invocation(s) still awaiting results: {}",
                self.outstanding.len(),
                self.outstanding.join(", ")
            )))
        }
    }
}
