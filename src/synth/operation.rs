//! Device operations produced by synthesis.

use serde::Serialize;

/// HTTP verbs the REST synthesizers emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Create a resource.
    Post,
    /// Partially update a resource.
    Patch,
    /// Replace a resource.
    Put,
    /// Remove a resource.
    Delete,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// One REST call against the device's configuration API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path relative to the device endpoint, starting with `/`.
    pub path: String,
    /// JSON body, absent for deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl RestRequest {
    /// Builds a request with a body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Builds a bodyless delete.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A single mutation to send to the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum Operation {
    /// A CLI configuration line.
    Command(String),
    /// A REST API call.
    Request(RestRequest),
}

impl Operation {
    /// One-line human description, used by plan output and apply logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command(line) => line.clone(),
            Self::Request(req) => format!("{} {}", req.method, req.path),
        }
    }

    /// True when the operation travels over the CLI channel.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(self, Self::Command(_))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}
