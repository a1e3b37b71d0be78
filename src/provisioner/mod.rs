//! Share Provisioner
//!
//! Drives a claim through the provisioning pipeline:
//! request construction, share creation, readiness polling, access grant,
//! export selection and volume assembly.

pub mod export;
pub mod microversion;
pub mod quantity;
pub mod request;
pub mod volume;
pub mod waiter;
pub mod zones;

pub use export::*;
pub use microversion::*;
pub use request::*;
pub use volume::*;
pub use waiter::*;
pub use zones::*;

use crate::domain::ports::{AccessRequest, SharedFileSystemApiRef, ZoneSourceRef};
use crate::error::Result;
use k8s_openapi::api::core::v1::PersistentVolume;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Access rule granted on every new share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    pub access_type: String,
    pub access_to: String,
    pub access_level: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            access_type: "ip".to_string(),
            access_to: "0.0.0.0/0".to_string(),
            access_level: "rw".to_string(),
        }
    }
}

impl From<&AccessConfig> for AccessRequest {
    fn from(config: &AccessConfig) -> Self {
        Self {
            access_type: config.access_type.clone(),
            access_to: config.access_to.clone(),
            access_level: config.access_level.clone(),
        }
    }
}

/// Configuration for the provisioner
#[derive(Debug, Clone, Default)]
pub struct ProvisionerConfig {
    /// Share readiness polling
    pub poll: PollPolicy,
    /// Access rule to grant, `None` to leave the share without rules
    pub access: Option<AccessConfig>,
}

// =============================================================================
// Provisioner
// =============================================================================

/// Provisions Manila NFS shares for PersistentVolumeClaims
pub struct Provisioner {
    config: ProvisionerConfig,
    api: SharedFileSystemApiRef,
    zones: ZoneSourceRef,
    microversion: Microversion,
}

impl Provisioner {
    /// Create a provisioner after checking the client microversion against
    /// the range the server supports.
    pub async fn connect(
        config: ProvisionerConfig,
        api: SharedFileSystemApiRef,
        zones: ZoneSourceRef,
    ) -> Result<Self> {
        let version = api.api_version().await?;
        info!(
            "Server microversions: min {:?}, max {:?}",
            version.min_version, version.version
        );

        let microversion =
            check_microversion(api.microversion(), &version.min_version, &version.version)?;
        info!("Using microversion {}", microversion);

        Ok(Self {
            config,
            api,
            zones,
            microversion,
        })
    }

    /// Negotiated microversion
    pub fn microversion(&self) -> Microversion {
        self.microversion
    }

    /// Provision a share for a claim and describe it as a PersistentVolume.
    ///
    /// Fails on the first step that fails; nothing is retried here apart
    /// from readiness polling, and a share created before a later failure is
    /// left for the caller to clean up.
    pub async fn provision(&self, options: &ProvisionOptions) -> Result<PersistentVolume> {
        info!(
            "Provisioning claim {}/{}",
            options.claim_namespace(),
            options.claim_name()
        );

        let zones = &self.zones;
        let request = prepare_create_request(options, || zones.all_zones()).await?;
        debug!("Share create request: {:?}", request);

        let share = self.api.create_share(&request).await?;
        info!("Created share {} ({})", share.id, request.name);

        let share =
            wait_until_available(|| self.api.get_share(&share.id), &share.id, &self.config.poll)
                .await?;

        if let Some(access) = &self.config.access {
            let rule = self
                .api
                .grant_access(&share.id, &AccessRequest::from(access))
                .await?;
            debug!(
                "Granted {} access to {} on share {} (rule {})",
                rule.access_level, rule.access_to, share.id, rule.id
            );
        }

        let locations = self.api.list_export_locations(&share.id).await?;
        debug!("Share {} export locations: {:?}", share.id, locations);

        let location = choose_export_location(&locations)?;
        info!("Selected export location {} for share {}", location.path, share.id);

        let volume = assemble_volume(options, &share, location)?;
        info!(
            "Provisioned volume {} for claim {}/{}",
            options.volume_name,
            options.claim_namespace(),
            options.claim_name()
        );

        Ok(volume)
    }

    /// Delete the share backing a volume created by [`Provisioner::provision`]
    pub async fn delete(&self, volume: &PersistentVolume) -> Result<()> {
        let share_id = share_id_from_volume(volume)?;
        info!("Deleting share {}", share_id);
        self.api.delete_share(share_id).await
    }
}
