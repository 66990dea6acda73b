//! Take the identity from a request header, typically set by a trusted proxy in front of the gateway.

use ::axum::http::{HeaderMap, HeaderName};
use ::regex::Regex;
use ::serde::Deserialize;

use super::{config_error, parse_conf, Middleware};
use crate::error::Result;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderFieldConf {
    headers: Vec<HeaderConf>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderConf {
    key: String,
    pattern: Option<String>,
}

#[derive(Debug)]
struct Field {
    key: HeaderName,
    pattern: Option<Regex>,
}

/// Headers are tried in configuration order; the first one present, and matching its
/// pattern if it has one, becomes the identity. Skipped entirely once an earlier
/// middleware established an identity. Finding nothing is not an error.
#[derive(Debug)]
pub struct HeaderField {
    fields: Vec<Field>,
}

impl HeaderField {
    pub const TYPE: &'static str = "header_field";

    pub(super) fn apply(&self, headers: &HeaderMap, identity: &mut Option<String>) -> Result<()> {
        if identity.is_some() {
            return Ok(());
        }
        *identity = self.fields.iter().find_map(|field| {
            let value = headers.get(&field.key)?.to_str().ok()?;
            match &field.pattern {
                Some(pattern) if !pattern.is_match(value) => None,
                _ if value.is_empty() => None,
                _ => Some(value.to_owned()),
            }
        });
        Ok(())
    }
}

pub(super) fn build(conf: &serde_json::Map<String, serde_json::Value>) -> Result<Middleware> {
    let conf: HeaderFieldConf = parse_conf(HeaderField::TYPE, conf)?;
    let fields = conf
        .headers
        .into_iter()
        .enumerate()
        .map(|(i, header)| {
            let key = HeaderName::from_bytes(header.key.as_bytes()).map_err(|e| {
                config_error(HeaderField::TYPE, format!("field `headers[{}].key`: {}", i, e))
            })?;
            let pattern = header
                .pattern
                .map(|pattern| {
                    Regex::new(&pattern).map_err(|e| {
                        config_error(
                            HeaderField::TYPE,
                            format!("field `headers[{}].pattern`: {}", i, e),
                        )
                    })
                })
                .transpose()?;
            Ok(Field { key, pattern })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Middleware::HeaderField(HeaderField { fields }))
}
