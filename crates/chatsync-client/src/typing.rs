//! Outbound typing indicator throttle.

use std::time::Duration;

use tokio::time::Instant;

/// Decides which keystrokes produce a `typing` frame.
///
/// A frame goes out only when the previous keystroke is at least one window
/// old. Every keystroke, emitted or not, restarts the window, so a burst of
/// typing yields a single frame. There is no "stopped typing" signal.
#[derive(Debug, Clone)]
pub struct TypingThrottle {
    window: Duration,
    last_keystroke: Option<Instant>,
}

impl TypingThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_keystroke: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register a keystroke at `now`. Returns whether to send a frame.
    pub fn keystroke(&mut self, now: Instant) -> bool {
        let quiet = match self.last_keystroke {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        };
        self.last_keystroke = Some(now);
        quiet
    }
}
