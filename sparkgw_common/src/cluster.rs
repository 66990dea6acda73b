//! Registration table of the managed clusters.

use ::std::collections::BTreeSet;

use ::anyhow::anyhow;
use ::serde::Deserialize;

use crate::{
    config::Credentials,
    error::{GatewayError, Result},
    naming::GeneratedName,
};

/// A namespace of a cluster that Spark applications can be submitted to.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    pub name: String,
    /// Stable id of the namespace, part of every generated name.
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Stable id of the cluster, part of every generated name.
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Kubernetes API server of the cluster
    pub master_url: String,
    /// Endpoint of the manager running in the cluster
    pub manager_url: String,
    /// HTTP Basic credentials presented to the manager, for managers with a Basic chain.
    #[serde(default)]
    pub manager_credentials: Option<Credentials>,
    pub namespaces: Vec<NamespaceConfig>,
}

impl ClusterConfig {
    pub fn namespace_by_name(&self, name: &str) -> Option<&NamespaceConfig> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    pub fn namespace_by_id(&self, id: &str) -> Option<&NamespaceConfig> {
        self.namespaces.iter().find(|ns| ns.id == id)
    }
}

/// Cluster and namespace an application lives in.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub cluster: &'a ClusterConfig,
    pub namespace: &'a NamespaceConfig,
}

/// Immutable table of clusters, in configuration order.
#[derive(Debug, Clone)]
pub struct ClusterRegistry {
    clusters: Vec<ClusterConfig>,
}

impl ClusterRegistry {
    /// Validate the table. Ids are embedded in generated names and split on `-`,
    /// so they must be non-empty, made of `[a-z0-9]` and unique.
    pub fn new(clusters: Vec<ClusterConfig>) -> Result<Self> {
        let mut cluster_ids = BTreeSet::new();
        for cluster in &clusters {
            validate_id("cluster", &cluster.id)?;
            if !cluster_ids.insert(cluster.id.as_str()) {
                return Err(GatewayError::internal(anyhow!(
                    "Duplicated cluster id `{}`",
                    cluster.id
                )));
            }
            let mut namespace_ids = BTreeSet::new();
            let mut namespace_names = BTreeSet::new();
            for namespace in &cluster.namespaces {
                validate_id("namespace", &namespace.id)?;
                if !namespace_ids.insert(namespace.id.as_str()) {
                    return Err(GatewayError::internal(anyhow!(
                        "Duplicated namespace id `{}` in cluster `{}`",
                        namespace.id,
                        cluster.id
                    )));
                }
                if !namespace_names.insert(namespace.name.as_str()) {
                    return Err(GatewayError::internal(anyhow!(
                        "Duplicated namespace `{}` in cluster `{}`",
                        namespace.name,
                        cluster.id
                    )));
                }
            }
        }
        Ok(Self { clusters })
    }

    pub fn clusters(&self) -> &[ClusterConfig] {
        &self.clusters
    }

    pub fn get(&self, cluster_id: &str) -> Result<&ClusterConfig> {
        self.clusters
            .iter()
            .find(|cluster| cluster.id == cluster_id)
            .ok_or_else(|| GatewayError::not_found(anyhow!("Cluster `{}` not found", cluster_id)))
    }

    /// Choose where an application of `namespace` goes.
    /// An explicitly requested cluster must register the namespace; otherwise the first
    /// registered cluster that has it is used.
    pub fn select(&self, namespace: &str, requested_cluster: Option<&str>) -> Result<Placement<'_>> {
        match requested_cluster {
            Some(cluster_id) => {
                let cluster = self.get(cluster_id)?;
                let namespace = cluster.namespace_by_name(namespace).ok_or_else(|| {
                    GatewayError::bad_request(anyhow!(
                        "Namespace `{}` is not registered in cluster `{}`",
                        namespace,
                        cluster_id
                    ))
                })?;
                Ok(Placement { cluster, namespace })
            }
            None => self
                .clusters
                .iter()
                .find_map(|cluster| {
                    cluster
                        .namespace_by_name(namespace)
                        .map(|namespace| Placement { cluster, namespace })
                })
                .ok_or_else(|| {
                    GatewayError::bad_request(anyhow!(
                        "Namespace `{}` is not registered in any cluster",
                        namespace
                    ))
                }),
        }
    }

    /// Find the cluster and namespace encoded in a generated name.
    pub fn resolve(&self, name: &GeneratedName) -> Result<Placement<'_>> {
        let cluster = self.get(&name.cluster_id)?;
        let namespace = cluster.namespace_by_id(&name.namespace_id).ok_or_else(|| {
            GatewayError::not_found(anyhow!(
                "Namespace id `{}` not found in cluster `{}`",
                name.namespace_id,
                name.cluster_id
            ))
        })?;
        Ok(Placement { cluster, namespace })
    }
}

/// Ids end up in Kubernetes object names, which only allow lowercase alphanumerics
/// besides the `-` separating the segments.
fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        Err(GatewayError::internal(anyhow!("{} id cannot be empty", what)))
    } else if !id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        Err(GatewayError::internal(anyhow!(
            "{} id `{}` must only contain lowercase letters and digits",
            what,
            id
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ::serde_json::{from_value, json};

    use super::*;
    use crate::error::ErrorKind;

    fn cluster(id: &str, namespaces: &[(&str, &str)]) -> ClusterConfig {
        ClusterConfig {
            id: id.to_owned(),
            name: format!("cluster {}", id),
            master_url: format!("https://{}.example.com", id),
            manager_url: format!("http://manager.{}.example.com", id),
            manager_credentials: None,
            namespaces: namespaces
                .iter()
                .map(|(name, id)| NamespaceConfig {
                    name: (*name).to_owned(),
                    id: (*id).to_owned(),
                })
                .collect(),
        }
    }

    #[test]
    fn deserialize_cluster_config() -> anyhow::Result<()> {
        let config: ClusterConfig = from_value(json!({
            "id": "c1",
            "name": "cluster one",
            "master_url": "https://c1.example.com",
            "manager_url": "http://manager.c1.example.com",
            "namespaces": [{"name": "ns", "id": "ns1"}]
        }))?;
        let expected = ClusterConfig {
            name: "cluster one".to_owned(),
            ..cluster("c1", &[("ns", "ns1")])
        };
        assert_eq!(config, expected);

        let config: ClusterConfig = from_value(json!({
            "id": "c1",
            "name": "cluster one",
            "master_url": "https://c1.example.com",
            "manager_url": "http://manager.c1.example.com",
            "manager_credentials": {"username": "gateway", "password": "s3cret"},
            "namespaces": []
        }))?;
        assert_eq!(
            config.manager_credentials,
            Some(Credentials {
                username: "gateway".to_owned(),
                password: "s3cret".to_owned(),
            })
        );
        Ok(())
    }

    #[test]
    fn reject_invalid_ids() {
        for clusters in [
            vec![cluster("", &[])],
            vec![cluster("c-1", &[])],
            vec![cluster("c1", &[("ns", "ns-1")])],
            vec![cluster("C1", &[])],
            vec![cluster("east_1", &[])],
            vec![cluster("c1", &[("ns", "x.y")])],
            vec![cluster("c1", &[("ns", "a_b")])],
            vec![cluster("c1", &[]), cluster("c1", &[])],
            vec![cluster("c1", &[("a", "x"), ("b", "x")])],
            vec![cluster("c1", &[("a", "x"), ("a", "y")])],
        ] {
            assert!(ClusterRegistry::new(clusters).is_err());
        }
    }

    #[test]
    fn select_first_cluster_with_namespace() -> Result<()> {
        let registry = ClusterRegistry::new(vec![
            cluster("c1", &[("a", "a1")]),
            cluster("c2", &[("b", "b2")]),
            cluster("c3", &[("b", "b3")]),
        ])?;
        let placement = registry.select("b", None)?;
        assert_eq!(placement.cluster.id, "c2");
        assert_eq!(placement.namespace.id, "b2");

        let placement = registry.select("b", Some("c3"))?;
        assert_eq!(placement.cluster.id, "c3");
        assert_eq!(placement.namespace.id, "b3");
        Ok(())
    }

    #[test]
    fn select_fails_for_unknown_placement() -> Result<()> {
        let registry = ClusterRegistry::new(vec![cluster("c1", &[("a", "a1")])])?;
        assert!(registry
            .select("b", None)
            .is_err_and(|e| e.kind() == ErrorKind::BadRequest));
        assert!(registry
            .select("b", Some("c1"))
            .is_err_and(|e| e.kind() == ErrorKind::BadRequest));
        assert!(registry
            .select("a", Some("c9"))
            .is_err_and(|e| e.kind() == ErrorKind::NotFound));
        Ok(())
    }

    #[test]
    fn resolve_generated_name() -> Result<()> {
        let registry = ClusterRegistry::new(vec![cluster("c1", &[("ns", "ns1")])])?;
        let name = GeneratedName::generate("c1", "ns1");
        let placement = registry.resolve(&name)?;
        assert_eq!(placement.cluster.id, "c1");
        assert_eq!(placement.namespace.name, "ns");

        let unknown = GeneratedName::generate("c1", "ns2");
        assert!(registry
            .resolve(&unknown)
            .is_err_and(|e| e.kind() == ErrorKind::NotFound));
        Ok(())
    }
}
