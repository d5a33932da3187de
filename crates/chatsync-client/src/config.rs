//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client can point at a local
//! development server with zero configuration.

use std::time::Duration;

use chatsync_net::{endpoint, NetError};
use chatsync_shared::constants::{
    DEFAULT_PER_PAGE, DEFAULT_ROOM, DEFAULT_SERVER_URL, TYPING_DEBOUNCE_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat server's HTTP API.
    /// Env: `CHATSYNC_SERVER_URL`
    /// Default: `http://127.0.0.1:8000`
    pub server_url: String,

    /// Explicit websocket URL. When unset it is derived from `server_url`
    /// and `room`, see [`ClientConfig::websocket_url`].
    /// Env: `CHATSYNC_WS_URL`
    pub ws_url: Option<String>,

    /// Room to join.
    /// Env: `CHATSYNC_ROOM`
    /// Default: `lobby`
    pub room: String,

    /// Name sent with outbound messages and typing frames.
    /// Env: `CHATSYNC_USERNAME`
    /// Default: `anonymous`
    pub username: String,

    /// CSRF token for attachment uploads.
    /// Env: `CHATSYNC_CSRF_TOKEN`
    /// Default: none
    pub csrf_token: Option<String>,

    /// History page size.
    /// Env: `CHATSYNC_PER_PAGE`
    /// Default: `50`
    pub per_page: u32,

    /// Last history page already shown. The first older-page request asks
    /// for `initial_page + 1`.
    /// Env: `CHATSYNC_INITIAL_PAGE`
    /// Default: `0`
    pub initial_page: u32,

    /// Typing indicator window.
    /// Env: `CHATSYNC_TYPING_DEBOUNCE_MS`
    /// Default: `1000`
    pub typing_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            ws_url: None,
            room: DEFAULT_ROOM.to_string(),
            username: "anonymous".to_string(),
            csrf_token: None,
            per_page: DEFAULT_PER_PAGE,
            initial_page: 0,
            typing_debounce: Duration::from_millis(TYPING_DEBOUNCE_MS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CHATSYNC_SERVER_URL") {
            config.server_url = url.trim_end_matches('/').to_string();
        }

        if let Some(url) = lookup("CHATSYNC_WS_URL") {
            if !url.is_empty() {
                config.ws_url = Some(url);
            }
        }

        if let Some(room) = lookup("CHATSYNC_ROOM") {
            if room.is_empty() {
                tracing::warn!("Empty CHATSYNC_ROOM, using default");
            } else {
                config.room = room;
            }
        }

        if let Some(name) = lookup("CHATSYNC_USERNAME") {
            if !name.is_empty() {
                config.username = name;
            }
        }

        if let Some(token) = lookup("CHATSYNC_CSRF_TOKEN") {
            if !token.is_empty() {
                config.csrf_token = Some(token);
            }
        }

        if let Some(val) = lookup("CHATSYNC_PER_PAGE") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.per_page = n,
                _ => tracing::warn!(value = %val, "Invalid CHATSYNC_PER_PAGE, using default"),
            }
        }

        if let Some(val) = lookup("CHATSYNC_INITIAL_PAGE") {
            match val.parse::<u32>() {
                Ok(n) => config.initial_page = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid CHATSYNC_INITIAL_PAGE, using default")
                }
            }
        }

        if let Some(val) = lookup("CHATSYNC_TYPING_DEBOUNCE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.typing_debounce = Duration::from_millis(ms),
                Err(_) => tracing::warn!(
                    value = %val,
                    "Invalid CHATSYNC_TYPING_DEBOUNCE_MS, using default"
                ),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    /// Websocket endpoint for the room.
    ///
    /// Derived as `ws(s)://{host}/ws/chat/{room}/` from `server_url` unless
    /// `ws_url` is set. The room name is percent-encoded.
    pub fn websocket_url(&self) -> Result<String, NetError> {
        if let Some(ref url) = self.ws_url {
            return Ok(url.clone());
        }
        Ok(endpoint::room_websocket_url(&self.server_url, &self.room)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "http://127.0.0.1:8000");
        assert_eq!(config.room, "lobby");
        assert_eq!(config.per_page, 50);
        assert_eq!(config.initial_page, 0);
        assert_eq!(config.typing_debounce, Duration::from_millis(1000));
        assert_eq!(
            config.websocket_url().unwrap(),
            "ws://127.0.0.1:8000/ws/chat/lobby/"
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATSYNC_SERVER_URL", "https://chat.example.org/"),
            ("CHATSYNC_ROOM", "rust"),
            ("CHATSYNC_USERNAME", "alice"),
            ("CHATSYNC_CSRF_TOKEN", "tok"),
            ("CHATSYNC_PER_PAGE", "20"),
            ("CHATSYNC_INITIAL_PAGE", "1"),
            ("CHATSYNC_TYPING_DEBOUNCE_MS", "250"),
        ]));

        assert_eq!(config.server_url, "https://chat.example.org");
        assert_eq!(config.username, "alice");
        assert_eq!(config.csrf_token.as_deref(), Some("tok"));
        assert_eq!(config.per_page, 20);
        assert_eq!(config.initial_page, 1);
        assert_eq!(config.typing_debounce, Duration::from_millis(250));
        assert_eq!(
            config.websocket_url().unwrap(),
            "wss://chat.example.org/ws/chat/rust/"
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATSYNC_PER_PAGE", "0"),
            ("CHATSYNC_INITIAL_PAGE", "-3"),
            ("CHATSYNC_TYPING_DEBOUNCE_MS", "soon"),
            ("CHATSYNC_ROOM", ""),
        ]));

        assert_eq!(config.per_page, DEFAULT_PER_PAGE);
        assert_eq!(config.initial_page, 0);
        assert_eq!(config.typing_debounce, Duration::from_millis(TYPING_DEBOUNCE_MS));
        assert_eq!(config.room, DEFAULT_ROOM);
    }

    #[test]
    fn test_explicit_ws_url_wins() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "CHATSYNC_WS_URL",
            "ws://10.0.0.2:9000/socket",
        )]));
        assert_eq!(config.websocket_url().unwrap(), "ws://10.0.0.2:9000/socket");
    }

    #[test]
    fn test_room_name_is_encoded_in_ws_url() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATSYNC_SERVER_URL", "http://chat.local:8000"),
            ("CHATSYNC_ROOM", "late night?"),
        ]));
        assert_eq!(
            config.websocket_url().unwrap(),
            "ws://chat.local:8000/ws/chat/late%20night%3F/"
        );
    }
}
