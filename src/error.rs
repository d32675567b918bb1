use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::events::Dialog;

/// Failures talking to the Immich server.
///
/// Both variants end the running slideshow session; there is no retry.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the API key (HTTP 401).
    #[error("authentication failed: {message}")]
    Auth {
        message: String,
        details: BTreeMap<String, String>,
    },

    /// Any other non-200 response, a connection failure or an undecodable body.
    #[error("remote error: {message}")]
    Remote {
        message: String,
        details: BTreeMap<String, String>,
    },
}

impl ApiError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Auth { message, .. } | Self::Remote { message, .. } => message,
        }
    }

    /// Top-level fields of the server's JSON error body, if it sent one.
    pub fn details(&self) -> &BTreeMap<String, String> {
        match self {
            Self::Auth { details, .. } | Self::Remote { details, .. } => details,
        }
    }

    /// The message box shown to the user before the session stops.
    pub fn dialog(&self) -> Dialog {
        let header = match self {
            Self::Auth { .. } => "Immich rejected the API key",
            Self::Remote { .. } => "Unable to talk to the Immich server",
        };
        let message = match self {
            Self::Auth { .. } => format!(
                "{}. Check the api-key setting and that the key is still active.",
                self.message()
            ),
            Self::Remote { .. } => self.message().to_string(),
        };
        Dialog {
            header: header.to_string(),
            message,
            details: self
                .details()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::remote(message)
    }
}

/// Flattens a JSON error body into `key -> value` strings.
///
/// Non-object bodies produce an empty map.
pub(crate) fn detail_map(body: &Value) -> BTreeMap<String, String> {
    let Value::Object(fields) = body else {
        return BTreeMap::new();
    };
    fields
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

pub type Result<T> = std::result::Result<T, ApiError>;
