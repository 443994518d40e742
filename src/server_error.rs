use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerErrorKey {
    Internal,
    Forbidden,
    Unauthorized,
    Predictable,
    Unpredictable,
}

impl fmt::Display for ServerErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ServerErrorKey::Internal => "INTERNAL",
            ServerErrorKey::Forbidden => "FORBIDDEN",
            ServerErrorKey::Unauthorized => "UNAUTHORIZED",
            ServerErrorKey::Predictable => "PREDICTABLE",
            ServerErrorKey::Unpredictable => "UNPREDICTABLE",
        };
        f.write_str(key)
    }
}

/// Error derived from a non-success HTTP status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
    pub key: ServerErrorKey,
    pub user_message: String,
}

/// Reserved for domain-level failures reported by the backends. Nothing
/// produces one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalError {
    pub user_message: String,
}

/// Maps a status code to its error class. Callers decide whether the status
/// is an error at all; this only answers "which kind".
pub fn classify_status(status: u16) -> ServerError {
    let (key, user_message) = match status {
        500 => (ServerErrorKey::Internal, "Unexpected server error."),
        403 => (ServerErrorKey::Forbidden, "Access denied."),
        401 => (ServerErrorKey::Unauthorized, "Not authorized."),
        400 => (ServerErrorKey::Predictable, "Invalid request to the server."),
        _ => (ServerErrorKey::Unpredictable, "Unexpected server error code."),
    };
    ServerError {
        key,
        user_message: user_message.to_string(),
    }
}
