//! Classifies intercepted exchanges by method and URL.

use std::sync::OnceLock;

use regex::Regex;

/// Logical endpoint family of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET .../chats/{id}/messages`: full message list, newest first.
    ListMessages { conversation_id: Option<String> },
    /// `POST .../chats/{id}/messages`: user message out, bot reply back.
    SendMessage { conversation_id: Option<String> },
    /// Anything else; never observed.
    Other,
}

fn messages_path() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"/(?:chats|conversations)(?:/(?P<conversation>[^/?#]+))?/messages/?(?:[?#].*)?$")
                .ok()
        })
        .as_ref()
}

/// Maps an exchange's method and URL to its endpoint family.
pub fn classify(method: &str, url: &str) -> Endpoint {
    let Some(captures) = messages_path().and_then(|re| re.captures(url)) else {
        return Endpoint::Other;
    };
    let conversation_id = captures
        .name("conversation")
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty());

    match method.to_ascii_uppercase().as_str() {
        "GET" => Endpoint::ListMessages { conversation_id },
        "POST" => Endpoint::SendMessage { conversation_id },
        _ => Endpoint::Other,
    }
}
