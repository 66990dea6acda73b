//! Reject users authenticated by HTTP Basic whose username matches a configured pattern.

use ::anyhow::anyhow;
use ::axum::http::HeaderMap;
use ::regex::Regex;
use ::serde::Deserialize;
use ::tracing::debug;

use super::{
    basic_auth_user, compile_patterns, malformed_authorization, parse_conf, BasicAuth, Middleware,
};
use crate::error::{GatewayError, Result};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DenyListConf {
    #[serde(default)]
    patterns: Vec<String>,
}

/// Never establishes an identity, it only rejects.
#[derive(Debug)]
pub struct DenyList {
    patterns: Vec<Regex>,
}

impl DenyList {
    pub const TYPE: &'static str = "basic_deny_list";

    pub(super) fn apply(&self, headers: &HeaderMap) -> Result<()> {
        match basic_auth_user(headers) {
            BasicAuth::Absent => Ok(()),
            BasicAuth::Malformed => Err(malformed_authorization()),
            BasicAuth::User(user) if self.patterns.iter().any(|p| p.is_match(&user)) => {
                debug!("User {} is in the deny list", user);
                Err(GatewayError::forbidden(anyhow!("User `{}` is denied", user)))
            }
            BasicAuth::User(_) => Ok(()),
        }
    }
}

pub(super) fn build(conf: &serde_json::Map<String, serde_json::Value>) -> Result<Middleware> {
    let conf: DenyListConf = parse_conf(DenyList::TYPE, conf)?;
    let patterns = compile_patterns(DenyList::TYPE, "patterns", &conf.patterns)?;
    Ok(Middleware::DenyList(DenyList { patterns }))
}

#[cfg(test)]
mod tests {
    use ::axum_extra::headers::authorization::Credentials as _;
    use ::headers::Authorization;
    use ::http::{header::AUTHORIZATION, HeaderValue};
    use ::serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn deny_list(patterns: &[&str]) -> DenyList {
        match build(json!({ "patterns": patterns }).as_object().unwrap()).unwrap() {
            Middleware::DenyList(m) => m,
            other => panic!("unexpected middleware {:?}", other),
        }
    }

    fn basic(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, Authorization::basic(user, "pwd").0.encode());
        headers
    }

    #[test]
    fn denied_user_is_forbidden() {
        let result = deny_list(&["^mallory$"]).apply(&basic("mallory"));
        assert!(result.is_err_and(|e| e.kind() == ErrorKind::Forbidden));
    }

    #[test]
    fn other_users_pass() -> Result<()> {
        deny_list(&["^mallory$"]).apply(&basic("alice"))?;
        deny_list(&["^mallory$"]).apply(&HeaderMap::new())?;
        deny_list(&[]).apply(&basic("mallory"))?;
        Ok(())
    }

    #[test]
    fn malformed_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        let result = deny_list(&["^mallory$"]).apply(&headers);
        assert!(result.is_err_and(|e| e.kind() == ErrorKind::Unauthorized));
    }
}
