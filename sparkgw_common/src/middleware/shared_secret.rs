//! Authenticate callers by a shared secret token sent next to their identity.

use ::std::{collections::HashMap, fmt, fs};

use ::anyhow::anyhow;
use ::axum::http::{HeaderMap, HeaderName};
use ::serde::Deserialize;
use ::subtle::ConstantTimeEq;
use ::tracing::{debug, info};

use super::{config_error, parse_conf, Middleware};
use crate::error::{GatewayError, Result};

const DEFAULT_USER_HEADER: &str = "x-spark-gateway-user";
const DEFAULT_TOKEN_HEADER: &str = "x-spark-gateway-token";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SharedSecretConf {
    /// JSON file mapping each caller to its token.
    token_file: String,
    user_header: Option<String>,
    token_header: Option<String>,
}

pub struct SharedSecret {
    user_header: HeaderName,
    token_header: HeaderName,
    tokens: HashMap<String, String>,
}

impl SharedSecret {
    pub const TYPE: &'static str = "shared_secret";

    pub(super) fn apply(&self, headers: &HeaderMap, identity: &mut Option<String>) -> Result<()> {
        let Some(user) = headers.get(&self.user_header) else {
            return Ok(());
        };
        let user = user.to_str().map_err(|_| {
            GatewayError::unauthorized(anyhow!("Malformed {} header", self.user_header))
        })?;
        let token = headers.get(&self.token_header).ok_or_else(|| {
            GatewayError::unauthorized(anyhow!("Missing {} header", self.token_header))
        })?;
        let expected = self.tokens.get(user).ok_or_else(|| {
            debug!("Unknown caller {}", user);
            GatewayError::forbidden(anyhow!("Caller `{}` is not allowed", user))
        })?;
        // the comparison time only depends on the token lengths
        if !bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(GatewayError::unauthorized(anyhow!(
                "Wrong token for caller `{}`",
                user
            )));
        }
        *identity = Some(user.to_owned());
        Ok(())
    }
}

/// Tokens never show up in logs.
impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("user_header", &self.user_header)
            .field("token_header", &self.token_header)
            .field("callers", &self.tokens.len())
            .finish()
    }
}

fn header_name(field: &str, value: Option<String>, default: &'static str) -> Result<HeaderName> {
    match value {
        None => Ok(HeaderName::from_static(default)),
        Some(value) => HeaderName::from_bytes(value.as_bytes())
            .map_err(|e| config_error(SharedSecret::TYPE, format!("field `{}`: {}", field, e))),
    }
}

pub(super) fn build(conf: &serde_json::Map<String, serde_json::Value>) -> Result<Middleware> {
    let conf: SharedSecretConf = parse_conf(SharedSecret::TYPE, conf)?;
    let user_header = header_name("user_header", conf.user_header, DEFAULT_USER_HEADER)?;
    let token_header = header_name("token_header", conf.token_header, DEFAULT_TOKEN_HEADER)?;
    let content = fs::read_to_string(&conf.token_file).map_err(|e| {
        config_error(
            SharedSecret::TYPE,
            format!("field `token_file`: cannot read {}: {}", conf.token_file, e),
        )
    })?;
    let tokens: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
        config_error(
            SharedSecret::TYPE,
            format!("field `token_file`: invalid token map {}: {}", conf.token_file, e),
        )
    })?;
    info!("Loaded {} caller tokens from {}", tokens.len(), conf.token_file);
    Ok(Middleware::SharedSecret(SharedSecret {
        user_header,
        token_header,
        tokens,
    }))
}
