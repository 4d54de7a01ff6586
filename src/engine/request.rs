//! Per-request input handed to the engine and to every capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::form_urlencoded;
use uuid::Uuid;

/// Read requests run loaders; write requests run the leaf's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Read,
    Write,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Read => "read",
            RequestMethod::Write => "write",
        }
    }
}

/// Ordered key/value pairs with repeatable keys.
///
/// Used for query strings and form submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pairs: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` payload.
    pub fn parse(input: &[u8]) -> Self {
        form_urlencoded::parse(input).into_owned().collect()
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in submission order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl FromIterator<(String, String)> for FormData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// Immutable snapshot of process-level settings shared with capabilities.
///
/// Built once from configuration and passed explicitly with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Environment {
    values: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Inbound request as seen by the engine.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: RequestMethod,
    path: String,
    query: FormData,
    submission: FormData,
    headers: BTreeMap<String, String>,
    request_id: String,
    session: Option<String>,
    env: Arc<Environment>,
}

impl RouteRequest {
    fn new(method: RequestMethod, path: impl Into<String>, submission: FormData) -> Self {
        Self {
            method,
            path: path.into(),
            query: FormData::new(),
            submission,
            headers: BTreeMap::new(),
            request_id: Uuid::new_v4().to_string(),
            session: None,
            env: Arc::new(Environment::default()),
        }
    }

    /// A navigation: loaders run for the matched chain.
    pub fn read(path: impl Into<String>) -> Self {
        Self::new(RequestMethod::Read, path, FormData::new())
    }

    /// A submission: the leaf's action runs, then loaders revalidate.
    pub fn write(path: impl Into<String>, submission: FormData) -> Self {
        Self::new(RequestMethod::Write, path, submission)
    }

    pub fn with_query(mut self, query: FormData) -> Self {
        self.query = query;
        self
    }

    /// Header names are stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn with_env(mut self, env: Arc<Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &FormData {
        &self.query
    }

    pub fn submission(&self) -> &FormData {
        &self.submission
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}
