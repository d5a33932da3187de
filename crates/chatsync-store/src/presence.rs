//! Online-user tracking.
//!
//! Membership comes from presence events only; posting a message does not
//! make a user count as online.

use tracing::debug;

/// Usernames currently online, in the order they joined.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    online: Vec<String>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `username` as online. Returns `false` if it already was.
    pub fn join(&mut self, username: &str) -> bool {
        if self.is_online(username) {
            return false;
        }
        self.online.push(username.to_owned());
        debug!(user = %username, online = self.online.len(), "User joined");
        true
    }

    /// Mark `username` as offline. Returns `false` if it was not online.
    pub fn leave(&mut self, username: &str) -> bool {
        let Some(pos) = self.online.iter().position(|u| u == username) else {
            return false;
        };
        self.online.remove(pos);
        debug!(user = %username, online = self.online.len(), "User left");
        true
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.online.iter().any(|u| u == username)
    }

    /// Owned copy of the online list for rendering.
    pub fn snapshot(&self) -> Vec<String> {
        self.online.clone()
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    /// Forget everyone.
    pub fn clear(&mut self) {
        self.online.clear();
    }
}
