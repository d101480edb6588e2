//! Conversation memory shared by both agent variants.
//!
//! Memory holds the committed conversation (user turns and final assistant
//! answers). Intermediate tool traffic of a turn is kept by the agent itself
//! and never enters memory.

pub mod sliding_window;

use crate::core_types::Message;
use crate::errors::AgentError;
use async_trait::async_trait;
pub use sliding_window::SlidingWindowMemory;

pub const DEFAULT_MEMORY_WINDOW: usize = 40;

#[async_trait]
pub trait ConversationMemory: Send + Sync {
    async fn add_message(&mut self, message: Message) -> Result<(), AgentError>;
    fn get_context(&self) -> Vec<Message>;
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
