use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ResourceId = i64;

/// Remote collections reachable under the controller API root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    DecisionEnvironments,
    Credentials,
    Rulebooks,
    AwxTokens,
    Activations,
    ExtraVars,
}

impl Collection {
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::DecisionEnvironments => "decision-environments",
            Collection::Credentials => "credentials",
            Collection::Rulebooks => "rulebooks",
            Collection::AwxTokens => "users/me/awx-tokens",
            Collection::Activations => "activations",
            Collection::ExtraVars => "extra-vars",
        }
    }

    /// The token listing has no server-side name filter; matching happens after listing.
    pub fn supports_name_filter(&self) -> bool {
        !matches!(self, Collection::AwxTokens)
    }

    pub fn list_path(&self) -> String {
        format!("{}/", self.path())
    }

    pub fn detail_path(&self, id: ResourceId) -> String {
        format!("{}/{}/", self.path(), id)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Patch,
}

impl ApiMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Patch => "PATCH",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: ApiMethod,
    /// Path relative to the API root, always with a trailing slash.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: ApiMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: ApiMethod::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn is_write(&self) -> bool {
        !matches!(self.method, ApiMethod::Get)
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub raw: String,
}

impl ApiResponse {
    /// Bodies that are not JSON are kept as a string value so callers can still report them.
    pub fn from_text(status: u16, raw: String) -> Self {
        let body = if raw.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw.clone()))
        };
        Self { status, body, raw }
    }

    pub fn json(status: u16, body: Value) -> Self {
        let raw = body.to_string();
        Self { status, body, raw }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn id(&self) -> Option<ResourceId> {
        record_id(&self.body)
    }
}

/// One page of a collection listing: `{count, results: [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<Value>,
}

pub fn record_id(record: &Value) -> Option<ResourceId> {
    match record.get("id")? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

pub fn record_name(record: &Value) -> Option<&str> {
    record.get("name").and_then(Value::as_str)
}
