//! Allow users authenticated by HTTP Basic whose username matches a configured pattern.

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
struct AllowListConf {
    #[serde(default)]
    patterns: Vec<String>,
}

/// No `Authorization` header: the request passes unauthenticated.
/// With the header, the username must match one of the patterns; an empty list
/// therefore rejects every request that carries credentials.
#[derive(Debug)]
pub struct AllowList {
    patterns: Vec<Regex>,
}

impl AllowList {
    pub const TYPE: &'static str = "basic_allow_list";

    pub(super) fn apply(&self, headers: &HeaderMap, identity: &mut Option<String>) -> Result<()> {
        match basic_auth_user(headers) {
            BasicAuth::Absent => Ok(()),
            BasicAuth::Malformed => Err(malformed_authorization()),
            BasicAuth::User(user) => {
                if self.patterns.iter().any(|pattern| pattern.is_match(&user)) {
                    *identity = Some(user);
                    Ok(())
                } else {
                    debug!("User {} is not in the allow list", user);
                    Err(GatewayError::forbidden(anyhow!(
                        "User `{}` is not allowed",
                        user
                    )))
                }
            }
        }
    }
}

pub(super) fn build(conf: &serde_json::Map<String, serde_json::Value>) -> Result<Middleware> {
    let conf: AllowListConf = parse_conf(AllowList::TYPE, conf)?;
    let patterns = compile_patterns(AllowList::TYPE, "patterns", &conf.patterns)?;
    Ok(Middleware::AllowList(AllowList { patterns }))
}
