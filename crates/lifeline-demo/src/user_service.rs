#![forbid(unsafe_code)]

//! Simulated HTTP user service.
//!
//! Requests go through an [`HttpBackend`] and are resolved by a
//! [`sources::delayed`] source, so the response arrives on the event queue a
//! fixed latency after subscribing. The default latency is long enough to
//! navigate away from the requesting view before the response lands.

use lifeline_runtime::{EventQueue, Source, sources};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// Default simulated latency of one request.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(3000);

const USERS_FIXTURE: &str = include_str!("../assets/users.json");

/// Postal address of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
}

/// Employer of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(rename = "catchPhrase", default)]
    pub catch_phrase: String,
}

/// One user record as served by `GET /users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub company: Option<Company>,
}

/// Failure of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Nothing is served at `path`.
    NotFound { path: String },
    /// The request never produced a response.
    Transport { path: String, message: String },
    /// The response body did not decode.
    Decode { message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => write!(f, "GET {path}: 404 not found"),
            Self::Transport { path, message } => write!(f, "GET {path}: {message}"),
            Self::Decode { message } => write!(f, "invalid response body: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }
}

/// Transport used by [`UserService`].
pub trait HttpBackend {
    /// Resolve `GET path` to a JSON body.
    fn get(&self, path: &str) -> Result<serde_json::Value, FetchError>;
}

/// In-memory backend serving the embedded user fixture.
#[derive(Debug, Clone)]
pub struct FixtureBackend {
    users: BTreeMap<u32, serde_json::Value>,
    failing: BTreeSet<u32>,
}

impl FixtureBackend {
    /// Backend over the ten embedded users.
    pub fn load() -> Result<Self, FetchError> {
        Self::from_json(USERS_FIXTURE)
    }

    /// Backend over a JSON array of user objects. Each object needs a
    /// numeric `id`.
    pub fn from_json(json: &str) -> Result<Self, FetchError> {
        let records: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut users = BTreeMap::new();
        for record in records {
            let id = record
                .get("id")
                .and_then(serde_json::Value::as_u64)
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| FetchError::Decode {
                    message: "fixture record without a numeric id".into(),
                })?;
            users.insert(id, record);
        }
        Ok(Self {
            users,
            failing: BTreeSet::new(),
        })
    }

    /// Make requests for the given ids fail with a transport error.
    #[must_use]
    pub fn with_failing(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.failing.extend(ids);
        self
    }

    /// Number of users served.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when the fixture is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl HttpBackend for FixtureBackend {
    fn get(&self, path: &str) -> Result<serde_json::Value, FetchError> {
        let not_found = || FetchError::NotFound {
            path: path.to_string(),
        };
        let id: u32 = path
            .strip_prefix("/users/")
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(not_found)?;
        if self.failing.contains(&id) {
            return Err(FetchError::Transport {
                path: path.to_string(),
                message: "connection reset by peer".into(),
            });
        }
        self.users.get(&id).cloned().ok_or_else(not_found)
    }
}

/// Configuration for [`UserService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Simulated latency between subscribing and the response.
    pub latency: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
        }
    }
}

impl ServiceConfig {
    /// Set the simulated latency.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Fetches users as one-shot sources.
#[derive(Clone)]
pub struct UserService {
    queue: EventQueue,
    backend: Rc<dyn HttpBackend>,
    config: ServiceConfig,
}

impl fmt::Debug for UserService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(queue: &EventQueue, backend: Rc<dyn HttpBackend>, config: ServiceConfig) -> Self {
        Self {
            queue: queue.clone(),
            backend,
            config,
        }
    }

    /// Latency applied to every request.
    #[must_use]
    pub fn latency(&self) -> Duration {
        self.config.latency
    }

    /// Request user `user_id` on behalf of `component`.
    ///
    /// The request start is logged now; the request itself is issued once
    /// per subscription and answers one latency later with exactly one user
    /// or one error.
    pub fn get_user_data(&self, user_id: u32, component: &str) -> Source<User, FetchError> {
        info!(component, user_id, "fetch started");
        let backend = Rc::clone(&self.backend);
        let path = format!("/users/{user_id}");
        let component = component.to_string();
        sources::delayed(&self.queue, self.config.latency, move || -> Result<User, FetchError> {
            let body = backend.get(&path)?;
            Ok(serde_json::from_value(body)?)
        })
        .inspect(move |user: &User| {
            info!(
                component = component.as_str(),
                user_id = user.id,
                name = user.name.as_str(),
                "fetch response received"
            );
        })
    }
}
