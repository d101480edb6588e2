//! Fixed-size sliding window memory.
//!
//! Keeps only the N most recent messages; the oldest message is evicted first.

use crate::core_types::Message;
use crate::errors::AgentError;
use crate::memory::ConversationMemory;
use async_trait::async_trait;
use std::collections::VecDeque;

pub struct SlidingWindowMemory {
    messages: VecDeque<Message>,
    max_messages: usize,
}

impl SlidingWindowMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max_messages),
            max_messages: max_messages.max(1),
        }
    }
}

impl Default for SlidingWindowMemory {
    fn default() -> Self {
        Self::new(super::DEFAULT_MEMORY_WINDOW)
    }
}

#[async_trait]
impl ConversationMemory for SlidingWindowMemory {
    async fn add_message(&mut self, message: Message) -> Result<(), AgentError> {
        if self.messages.len() >= self.max_messages {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        Ok(())
    }

    fn get_context(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}
