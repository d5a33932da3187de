//! Endpoint URLs under the chat server's base URL.
//!
//! Every path segment is percent-encoded, so room names containing spaces,
//! `?` or `/` stay a single segment.

use reqwest::Url;

use crate::error::NetError;

/// Parse `base`, assuming `http://` when no scheme is given.
fn parse_base(base: &str) -> Result<Url, NetError> {
    let base = base.trim();
    let with_scheme = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    Url::parse(&with_scheme).map_err(|e| NetError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// `base` followed by `segments` and a trailing slash.
pub fn join_segments(base: &str, segments: &[&str]) -> Result<Url, NetError> {
    let mut url = parse_base(base)?;
    url.path_segments_mut()
        .map_err(|_| NetError::InvalidUrl {
            url: base.to_string(),
            reason: "URL cannot carry a path".to_string(),
        })?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Ok(url)
}

/// Room websocket endpoint: `ws(s)://{host}/ws/chat/{room}/`.
pub fn room_websocket_url(server_url: &str, room: &str) -> Result<Url, NetError> {
    let mut url = join_segments(server_url, &["ws", "chat", room])?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).map_err(|_| NetError::InvalidUrl {
        url: server_url.to_string(),
        reason: format!("cannot switch scheme to {scheme}"),
    })?;
    Ok(url)
}
