//! Authentication middleware chain.
//!
//! The chain is built once at start-up from an ordered list of [MiddlewareDefinition]s.
//! Each definition names a builtin middleware type, looked up in [REGISTRY], and carries
//! a free-form configuration which is validated while building. Any invalid definition
//! fails the whole chain, so a server never runs with a partial chain.
//!
//! At request time every middleware sees the identity established by the ones before it.
//! A middleware rejecting the request stops the chain and the route handler.

mod allow_list;
mod deny_list;
mod header_field;
mod shared_secret;

use ::core::{convert::Infallible, fmt::Display};
use ::std::sync::Arc;

use ::anyhow::anyhow;
use ::axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use ::axum_extra::headers::authorization::{Basic, Credentials as _};
use ::regex::Regex;
use ::serde::{de::DeserializeOwned, Deserialize};
use ::serde_json::{Map, Value};
use ::tracing::{debug, info};

use crate::{
    application::ANONYMOUS_USER,
    error::{GatewayError, Result},
};

pub use allow_list::AllowList;
pub use deny_list::DenyList;
pub use header_field::HeaderField;
pub use shared_secret::SharedSecret;

/// One entry of the `middleware` configuration list.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub conf: Map<String, Value>,
}

/// Builtin middleware.
#[derive(Debug)]
pub enum Middleware {
    AllowList(AllowList),
    DenyList(DenyList),
    HeaderField(HeaderField),
    SharedSecret(SharedSecret),
}

type Constructor = fn(&Map<String, Value>) -> Result<Middleware>;

/// Middleware types that can be named in a [MiddlewareDefinition].
pub static REGISTRY: &[(&str, Constructor)] = &[
    (AllowList::TYPE, allow_list::build),
    (DenyList::TYPE, deny_list::build),
    (HeaderField::TYPE, header_field::build),
    (SharedSecret::TYPE, shared_secret::build),
];

impl Middleware {
    fn from_definition(definition: &MiddlewareDefinition) -> Result<Self> {
        let (_, constructor) = REGISTRY
            .iter()
            .find(|(kind, _)| *kind == definition.kind)
            .ok_or_else(|| {
                GatewayError::internal(anyhow!(
                    "Unknown middleware type `{}`",
                    definition.kind
                ))
            })?;
        constructor(&definition.conf)
    }

    /// Run the middleware against the request headers.
    /// `identity` carries the user established by the middleware before this one.
    fn apply(&self, headers: &HeaderMap, identity: &mut Option<String>) -> Result<()> {
        match self {
            Self::AllowList(m) => m.apply(headers, identity),
            Self::DenyList(m) => m.apply(headers),
            Self::HeaderField(m) => m.apply(headers, identity),
            Self::SharedSecret(m) => m.apply(headers, identity),
        }
    }
}

/// Immutable, ordered list of middleware shared by all requests.
#[derive(Debug, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Middleware>,
}

impl MiddlewareChain {
    /// Build the chain, all or nothing.
    pub fn build(definitions: &[MiddlewareDefinition]) -> Result<Self> {
        let middlewares = definitions
            .iter()
            .map(Middleware::from_definition)
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Middleware chain: [{}]",
            definitions
                .iter()
                .map(|d| d.kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { middlewares })
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run every middleware in order.
    /// # Return
    /// - `Ok(Some(user))` if a middleware established the identity.
    /// - `Ok(None)` if the request passes unauthenticated.
    /// - `Err(_)` with [crate::error::ErrorKind::Unauthorized] or [crate::error::ErrorKind::Forbidden]
    ///   if a middleware rejects the request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<String>> {
        let mut identity = None;
        for middleware in &self.middlewares {
            middleware.apply(headers, &mut identity)?;
        }
        Ok(identity)
    }
}

/// Authenticated user of a request, anonymous when no middleware established one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

impl Identity {
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_USER.to_owned())
    }

    pub fn user(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_else(Identity::anonymous))
    }
}

/// Axum middleware running the chain, install it with `axum::middleware::from_fn_with_state`.
pub async fn authenticate(
    State(chain): State<Arc<MiddlewareChain>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(user) = chain.authenticate(request.headers())? {
        debug!("Request authenticated as {}", user);
        request.extensions_mut().insert(Identity(user));
    }
    Ok(next.run(request).await)
}

/// Deserialize the configuration of a middleware, rejecting unknown fields.
fn parse_conf<C: DeserializeOwned>(kind: &str, conf: &Map<String, Value>) -> Result<C> {
    serde_json::from_value(Value::Object(conf.clone())).map_err(|e| config_error(kind, e))
}

fn config_error(kind: &str, e: impl Display) -> GatewayError {
    GatewayError::internal(anyhow!(
        "Invalid configuration of middleware `{}`: {}",
        kind,
        e
    ))
}

/// Compile the patterns of `field`, naming the first one that does not compile.
fn compile_patterns(kind: &str, field: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, pattern)| {
            Regex::new(pattern)
                .map_err(|e| config_error(kind, format!("field `{}[{}]`: {}", field, i, e)))
        })
        .collect()
}

/// Outcome of reading the `Authorization` header as HTTP Basic.
enum BasicAuth {
    Absent,
    Malformed,
    User(String),
}

const BASIC_PREFIX: &[u8] = b"Basic ";

fn basic_auth_user(headers: &HeaderMap) -> BasicAuth {
    let Some(value) = headers.get(http::header::AUTHORIZATION) else {
        return BasicAuth::Absent;
    };
    // `Basic::decode` expects the scheme and the separating space to be checked beforehand
    let is_basic = value
        .as_bytes()
        .get(..BASIC_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BASIC_PREFIX));
    if !is_basic {
        return BasicAuth::Malformed;
    }
    match Basic::decode(value) {
        Some(basic) => BasicAuth::User(basic.username().to_owned()),
        None => BasicAuth::Malformed,
    }
}

fn malformed_authorization() -> GatewayError {
    GatewayError::unauthorized(anyhow!("Malformed authorization header"))
}
