//! Kubernetes Platform Adapter
//!
//! Reads claims and storage classes, publishes provisioned volumes and
//! discovers availability zones from node labels.

use crate::domain::ports::ZoneSource;
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Well-known zone label on nodes
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Zone label used by older clusters
pub const LEGACY_ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";

/// Reclaim policy used when a storage class does not set one
pub const DEFAULT_RECLAIM_POLICY: &str = "Delete";

// =============================================================================
// Zone Sources
// =============================================================================

/// Discovers zones from the labels of the cluster's nodes
#[derive(Clone)]
pub struct NodeZoneLister {
    client: Client,
}

impl NodeZoneLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Zone of a node, preferring the current label over the legacy one
fn node_zone(node: &Node) -> Option<&str> {
    let labels = node.metadata.labels.as_ref()?;
    labels
        .get(ZONE_LABEL)
        .or_else(|| labels.get(LEGACY_ZONE_LABEL))
        .map(String::as_str)
        .filter(|zone| !zone.is_empty())
}

#[async_trait]
impl ZoneSource for NodeZoneLister {
    async fn all_zones(&self) -> Result<BTreeSet<String>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes.list(&ListParams::default()).await?;

        let zones: BTreeSet<String> = list
            .items
            .iter()
            .filter_map(node_zone)
            .map(str::to_string)
            .collect();

        if zones.is_empty() {
            warn!("None of {} nodes carries a zone label", list.items.len());
        } else {
            debug!("Discovered zones {:?}", zones);
        }
        Ok(zones)
    }
}

/// Fixed set of zones
#[derive(Debug, Clone, Default)]
pub struct StaticZones(pub BTreeSet<String>);

impl StaticZones {
    pub fn new<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(zones.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl ZoneSource for StaticZones {
    async fn all_zones(&self) -> Result<BTreeSet<String>> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// Claims, Classes and Volumes
// =============================================================================

/// Provisioning settings carried by a storage class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSettings {
    pub parameters: BTreeMap<String, String>,
    pub reclaim_policy: String,
}

impl From<StorageClass> for ClassSettings {
    fn from(class: StorageClass) -> Self {
        Self {
            parameters: class.parameters.unwrap_or_default(),
            reclaim_policy: class
                .reclaim_policy
                .unwrap_or_else(|| DEFAULT_RECLAIM_POLICY.to_string()),
        }
    }
}

/// Fetch a claim from the cluster
pub async fn load_claim(
    client: Client,
    namespace: &str,
    name: &str,
) -> Result<PersistentVolumeClaim> {
    let claims: Api<PersistentVolumeClaim> = Api::namespaced(client, namespace);
    claims
        .get_opt(name)
        .await?
        .ok_or_else(|| Error::ResourceNotFound {
            kind: "PersistentVolumeClaim".into(),
            name: format!("{namespace}/{name}"),
        })
}

/// Read a claim manifest from a YAML file
pub fn load_claim_file(path: &Path) -> Result<PersistentVolumeClaim> {
    let content = std::fs::read_to_string(path)?;
    let claim: PersistentVolumeClaim = serde_yaml::from_str(&content)?;
    if claim.metadata.uid.as_deref().unwrap_or_default().is_empty() {
        return Err(Error::Validation(format!(
            "claim in {} has no metadata.uid",
            path.display()
        )));
    }
    Ok(claim)
}

/// Read a volume manifest from a YAML file
pub fn load_volume_file(path: &Path) -> Result<PersistentVolume> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Fetch the provisioning settings of a storage class
pub async fn load_storage_class(client: Client, name: &str) -> Result<ClassSettings> {
    let classes: Api<StorageClass> = Api::all(client);
    let class = classes
        .get_opt(name)
        .await?
        .ok_or_else(|| Error::ResourceNotFound {
            kind: "StorageClass".into(),
            name: name.to_string(),
        })?;
    Ok(class.into())
}

/// Fetch a volume from the cluster
pub async fn load_volume(client: Client, name: &str) -> Result<PersistentVolume> {
    let volumes: Api<PersistentVolume> = Api::all(client);
    volumes
        .get_opt(name)
        .await?
        .ok_or_else(|| Error::ResourceNotFound {
            kind: "PersistentVolume".into(),
            name: name.to_string(),
        })
}

/// Create a provisioned volume in the cluster
pub async fn create_volume(client: Client, volume: &PersistentVolume) -> Result<PersistentVolume> {
    let volumes: Api<PersistentVolume> = Api::all(client);
    let created = volumes.create(&PostParams::default(), volume).await?;
    info!(
        "Created PersistentVolume {}",
        created.metadata.name.as_deref().unwrap_or_default()
    );
    Ok(created)
}
