//! In-memory conversation sessions.
//!
//! Each session keeps the last `max_history` question/answer exchanges and
//! renders them as the history blob appended to the system prompt.

use crate::error::{KursError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone)]
struct Message {
    role: Role,
    content: String,
}

/// Tracks conversation history per session id.
pub struct SessionManager {
    max_history: usize,
    counter: AtomicUsize,
    sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl SessionManager {
    /// Create a manager keeping `max_history` exchanges per session.
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            counter: AtomicUsize::new(0),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Message>>>> {
        self.sessions
            .lock()
            .map_err(|e| KursError::Session(format!("Session lock poisoned: {}", e)))
    }

    /// Start a new, empty session and return its id.
    pub fn create_session(&self) -> Result<String> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("session_{}", n);
        self.lock()?.insert(id.clone(), Vec::new());
        debug!("Created {}", id);
        Ok(id)
    }

    /// Record one exchange. Unknown ids start a new session under that id.
    pub fn add_exchange(&self, session_id: &str, user: &str, assistant: &str) -> Result<()> {
        let mut sessions = self.lock()?;
        let messages = sessions.entry(session_id.to_string()).or_default();
        messages.push(Message {
            role: Role::User,
            content: user.to_string(),
        });
        messages.push(Message {
            role: Role::Assistant,
            content: assistant.to_string(),
        });

        let keep = self.max_history * 2;
        if messages.len() > keep {
            let excess = messages.len() - keep;
            messages.drain(..excess);
        }
        Ok(())
    }

    /// Formatted history for a session, `None` if unknown or empty.
    pub fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>> {
        let sessions = self.lock()?;
        Ok(sessions
            .get(session_id)
            .filter(|messages| !messages.is_empty())
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| format!("{}: {}", m.role.label(), m.content))
                    .collect::<Vec<_>>()
                    .join("\n")
            }))
    }

    /// Forget a session's history. Returns whether it existed.
    pub fn clear_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(session_id).is_some())
    }
}
