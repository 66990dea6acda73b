//! Generated names of Spark applications.
//!
//! A generated name has the shape `{cluster_id}-{namespace_id}-{uuid}`.
//! Cluster and namespace ids never contain `-`, which is checked when the cluster
//! table is loaded, so the first two segments can always be split off again.

use ::core::fmt::Display;

use ::anyhow::anyhow;
use ::uuid::Uuid;

use crate::error::{GatewayError, Result};

/// Parts recovered from a generated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedName {
    pub cluster_id: String,
    pub namespace_id: String,
    pub uuid: Uuid,
}

impl GeneratedName {
    /// Mint a fresh name. Collisions are left to the randomness of UUID v4.
    pub fn generate(cluster_id: &str, namespace_id: &str) -> Self {
        Self {
            cluster_id: cluster_id.to_owned(),
            namespace_id: namespace_id.to_owned(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let mut segments = name.splitn(3, '-');
        let (Some(cluster_id), Some(namespace_id), Some(uuid)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(GatewayError::bad_request(anyhow!(
                "`{}` is not a generated application name",
                name
            )));
        };
        // only the canonical hyphenated form is produced by `generate`
        if cluster_id.is_empty() || namespace_id.is_empty() || uuid.len() != 36 {
            return Err(GatewayError::bad_request(anyhow!(
                "`{}` is not a generated application name",
                name
            )));
        }
        let uuid = Uuid::try_parse(uuid).map_err(|e| {
            GatewayError::bad_request(anyhow!(
                "`{}` is not a generated application name: {}",
                name,
                e
            ))
        })?;
        Ok(Self {
            cluster_id: cluster_id.to_owned(),
            namespace_id: namespace_id.to_owned(),
            uuid,
        })
    }
}

impl Display for GeneratedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.cluster_id,
            self.namespace_id,
            self.uuid.hyphenated()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn generated_name_round_trip() -> Result<()> {
        for (cluster, namespace) in [("c1", "ns1"), ("east", "0"), ("eu2", "spark")] {
            let name = GeneratedName::generate(cluster, namespace);
            let text = name.to_string();
            assert!(text.starts_with(&format!("{}-{}-", cluster, namespace)));

            let parsed = GeneratedName::parse(&text)?;
            assert_eq!(parsed, name);
            assert_eq!(parsed.uuid.to_string().len(), 36);
        }
        Ok(())
    }

    #[test]
    fn generated_names_differ() {
        let a = GeneratedName::generate("c1", "ns1");
        let b = GeneratedName::generate("c1", "ns1");
        assert_ne!(a.to_string(), b.to_string());
    }

    #[test]
    fn parse_rejects_malformed_names() {
        for name in [
            "",
            "job1",
            "c1-ns1",
            "c1-ns1-not-a-uuid",
            "-ns1-67e55044-10b1-426f-9247-bb680e5fe0c8",
            "c1--67e55044-10b1-426f-9247-bb680e5fe0c8",
            "c1-ns1-67e55044-10b1-426f-9247-bb680e5fe0c8-extra",
        ] {
            let result = GeneratedName::parse(name);
            assert!(
                result.is_err_and(|e| e.kind() == ErrorKind::BadRequest),
                "{} should not parse",
                name
            );
        }
    }

    #[test]
    fn parse_known_name() -> Result<()> {
        let parsed = GeneratedName::parse("c1-ns1-67e55044-10b1-426f-9247-bb680e5fe0c8")?;
        assert_eq!(parsed.cluster_id, "c1");
        assert_eq!(parsed.namespace_id, "ns1");
        assert_eq!(
            parsed.uuid.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
        Ok(())
    }
}
