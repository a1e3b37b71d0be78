//! Domain Ports - Core trait definitions for the provisioner
//!
//! These traits define the boundaries between the provisioning logic and the
//! systems it talks to. Adapters implement them; tests substitute fakes.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// =============================================================================
// Share Types
// =============================================================================

/// The only shared filesystem protocol this provisioner requests
pub const PROTOCOL_NFS: &str = "NFS";

/// Share status reported once the backend finished creating it
pub const STATUS_AVAILABLE: &str = "available";

/// Share create request sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShareRequest {
    /// Shared filesystem protocol
    pub share_proto: String,
    /// Size in whole gigabytes
    pub size: u64,
    /// Share name, derived from the claim UID
    pub name: String,
    /// Availability zone the share is created in
    pub availability_zone: String,
    /// Backend share type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_type: Option<String>,
    /// Provenance tags identifying the originating claim
    pub metadata: BTreeMap<String, String>,
}

/// A share as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Share {
    pub id: String,
    pub name: Option<String>,
    pub status: String,
    /// Granted size in gigabytes
    pub size: u64,
    pub availability_zone: Option<String>,
    pub share_proto: Option<String>,
    pub share_type: Option<String>,
    pub share_type_name: Option<String>,
    pub project_id: Option<String>,
    pub host: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Option<chrono::NaiveDateTime>,
}

/// A network endpoint a share can be mounted from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportLocation {
    /// Mount path, `host:path` for NFS
    pub path: String,
    /// Reserved for service and administrative use
    pub is_admin_only: bool,
    /// Driver hint that this location should be used first
    pub preferred: bool,
    pub id: String,
    pub share_instance_id: Option<String>,
}

/// API version document advertised by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersion {
    pub id: String,
    pub status: String,
    /// Minimum supported microversion
    pub min_version: String,
    /// Maximum supported microversion
    pub version: String,
}

/// Access rule to grant on a newly created share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// `ip`, `cert` or `user`
    pub access_type: String,
    /// Address, certificate or user the rule applies to
    pub access_to: String,
    /// `rw` or `ro`
    pub access_level: String,
}

/// Access rule as stored by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRule {
    pub id: String,
    pub share_id: String,
    pub access_type: String,
    pub access_to: String,
    pub access_level: String,
    pub state: String,
}

// =============================================================================
// Shared Filesystem Port
// =============================================================================

/// Port for the shared filesystem service
#[async_trait]
pub trait SharedFileSystemApi: Send + Sync {
    /// Get the API version document with the supported microversion range
    async fn api_version(&self) -> Result<ApiVersion>;

    /// Microversion this client pins its requests to
    fn microversion(&self) -> &str;

    /// Create a share
    async fn create_share(&self, request: &CreateShareRequest) -> Result<Share>;

    /// Get current share state
    async fn get_share(&self, share_id: &str) -> Result<Share>;

    /// List all export locations of a share
    async fn list_export_locations(&self, share_id: &str) -> Result<Vec<ExportLocation>>;

    /// Grant access to a share
    async fn grant_access(&self, share_id: &str, access: &AccessRequest) -> Result<AccessRule>;

    /// Delete a share
    async fn delete_share(&self, share_id: &str) -> Result<()>;
}

// =============================================================================
// Zone Discovery Port
// =============================================================================

/// Port for discovering every availability zone a share may be placed in
#[async_trait]
pub trait ZoneSource: Send + Sync {
    async fn all_zones(&self) -> Result<BTreeSet<String>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type SharedFileSystemApiRef = Arc<dyn SharedFileSystemApi>;
pub type ZoneSourceRef = Arc<dyn ZoneSource>;
