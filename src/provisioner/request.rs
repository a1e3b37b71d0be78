//! Share Create Request Builder
//!
//! Translates a PersistentVolumeClaim and its storage class parameters into
//! a Manila share create request.

use super::quantity::Quantity;
use super::zones::{choose_zone, zones_to_set};
use crate::domain::ports::{CreateShareRequest, PROTOCOL_NFS};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::str::FromStr;
use tracing::debug;

/// Storage class parameter holding a comma separated zone list
pub const ZONES_PARAMETER: &str = "zones";
/// Storage class parameter naming a Manila share type
pub const TYPE_PARAMETER: &str = "type";

/// Prefix of generated share names, followed by the claim UID
pub const SHARE_NAME_PREFIX: &str = "pvc-";

/// Provenance tag: namespace of the originating claim
pub const CREATED_FOR_CLAIM_NAMESPACE_TAG: &str = "kubernetes.io/created-for/pvc/namespace";
/// Provenance tag: name of the originating claim
pub const CREATED_FOR_CLAIM_NAME_TAG: &str = "kubernetes.io/created-for/pvc/name";
/// Provenance tag: name of the volume created for the claim
pub const CREATED_FOR_VOLUME_NAME_TAG: &str = "kubernetes.io/created-for/pv/name";

const STORAGE_RESOURCE: &str = "storage";

// =============================================================================
// Provision Options
// =============================================================================

/// Everything the provisioner is handed for a single claim
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Claim being provisioned
    pub claim: PersistentVolumeClaim,
    /// Name of the PersistentVolume to create
    pub volume_name: String,
    /// Reclaim policy copied onto the volume
    pub reclaim_policy: String,
    /// Storage class parameters
    pub parameters: BTreeMap<String, String>,
}

impl ProvisionOptions {
    pub fn new(claim: PersistentVolumeClaim, volume_name: impl Into<String>) -> Self {
        Self {
            claim,
            volume_name: volume_name.into(),
            reclaim_policy: "Delete".to_string(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_reclaim_policy(mut self, policy: impl Into<String>) -> Self {
        self.reclaim_policy = policy.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub(crate) fn claim_name(&self) -> &str {
        self.claim.metadata.name.as_deref().unwrap_or_default()
    }

    pub(crate) fn claim_namespace(&self) -> &str {
        self.claim.metadata.namespace.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// Class Parameters
// =============================================================================

/// Storage class parameters understood by this provisioner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassParameter {
    Zones,
    Type,
}

impl FromStr for ClassParameter {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        match key.to_lowercase().as_str() {
            ZONES_PARAMETER => Ok(ClassParameter::Zones),
            TYPE_PARAMETER => Ok(ClassParameter::Type),
            _ => Err(Error::InvalidParameter {
                key: key.to_string(),
            }),
        }
    }
}

// =============================================================================
// Request Construction
// =============================================================================

/// Requested storage of a claim in whole gigabytes, rounded up
pub fn claim_storage_gigabytes(claim: &PersistentVolumeClaim) -> Result<u64> {
    let not_configured = || Error::Validation("requested storage capacity must be set".into());

    let requested = claim
        .spec
        .as_ref()
        .and_then(|spec| spec.resources.as_ref())
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get(STORAGE_RESOURCE))
        .ok_or_else(not_configured)?;

    let quantity = Quantity::parse(&requested.0)?;
    if quantity.is_zero() {
        return Err(Error::Validation(
            "requested storage size must not have zero value".into(),
        ));
    }
    if quantity.is_negative() {
        return Err(Error::Validation(
            "requested storage size must be greater than zero".into(),
        ));
    }

    quantity.to_gigabytes_ceil()
}

/// Build the share create request for a claim.
///
/// `get_all_zones` is only awaited when the storage class does not name any
/// zones; its error is returned unchanged.
pub async fn prepare_create_request<F, Fut>(
    options: &ProvisionOptions,
    get_all_zones: F,
) -> Result<CreateShareRequest>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<BTreeSet<String>>>,
{
    let size = claim_storage_gigabytes(&options.claim)?;

    let uid = options.claim.metadata.uid.as_deref().unwrap_or_default();
    if uid.is_empty() {
        return Err(Error::Validation(format!(
            "claim {}/{} has no metadata.uid",
            options.claim_namespace(),
            options.claim_name()
        )));
    }
    let name = format!("{SHARE_NAME_PREFIX}{uid}");

    let mut metadata = BTreeMap::new();
    metadata.insert(
        CREATED_FOR_CLAIM_NAMESPACE_TAG.to_string(),
        options.claim_namespace().to_string(),
    );
    metadata.insert(
        CREATED_FOR_CLAIM_NAME_TAG.to_string(),
        options.claim_name().to_string(),
    );
    metadata.insert(CREATED_FOR_VOLUME_NAME_TAG.to_string(), name.clone());

    let mut availability_zone = None;
    let mut share_type = None;
    for (key, value) in &options.parameters {
        match key.parse::<ClassParameter>()? {
            ClassParameter::Zones => {
                let zones = zones_to_set(value)?;
                availability_zone = choose_zone(&zones, options.claim_name()).map(str::to_string);
            }
            ClassParameter::Type => share_type = Some(value.clone()),
        }
    }

    let availability_zone = match availability_zone {
        Some(zone) => zone,
        None => {
            let zones = get_all_zones().await?;
            choose_zone(&zones, options.claim_name())
                .map(str::to_string)
                .ok_or_else(|| Error::Validation("no availability zones discovered".into()))?
        }
    };

    debug!("Prepared share {} of {}G in zone {}", name, size, availability_zone);

    Ok(CreateShareRequest {
        share_proto: PROTOCOL_NFS.to_string(),
        size,
        name,
        availability_zone,
        share_type,
        metadata,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    pub(crate) fn claim(name: &str, storage: Option<&str>) -> PersistentVolumeClaim {
        let requests = storage.map(|s| {
            BTreeMap::from([(STORAGE_RESOURCE.to_string(), K8sQuantity(s.to_string()))])
        });
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("foo".to_string()),
                uid: Some("unique-uid".to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                resources: Some(VolumeResourceRequirements {
                    requests,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn all_zones() -> BTreeSet<String> {
        ["nova1", "nova2", "nova3"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    async fn prepare(options: &ProvisionOptions) -> Result<CreateShareRequest> {
        prepare_create_request(options, || async { Ok(all_zones()) }).await
    }

    async fn prepare_without_discovery(options: &ProvisionOptions) -> Result<CreateShareRequest> {
        prepare_create_request(options, || async {
            Err(Error::Internal("zone discovery must not be called".into()))
        })
        .await
    }

    fn expected_metadata(claim_name: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (CREATED_FOR_CLAIM_NAMESPACE_TAG.to_string(), "foo".to_string()),
            (CREATED_FOR_CLAIM_NAME_TAG.to_string(), claim_name.to_string()),
            (CREATED_FOR_VOLUME_NAME_TAG.to_string(), "pvc-unique-uid".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_discovered_zone_used_without_zones_parameter() {
        let options = ProvisionOptions::new(claim("pvc", Some("2G")), "pv");
        let request = prepare(&options).await.unwrap();

        let zones = all_zones();
        assert_eq!(
            request,
            CreateShareRequest {
                share_proto: PROTOCOL_NFS.to_string(),
                size: 2,
                name: "pvc-unique-uid".to_string(),
                availability_zone: choose_zone(&zones, "pvc").unwrap().to_string(),
                share_type: None,
                metadata: expected_metadata("pvc"),
            }
        );
    }

    #[tokio::test]
    async fn test_explicit_zone_skips_discovery() {
        let options =
            ProvisionOptions::new(claim("pvc", Some("2G")), "pv").with_parameter("zones", "nova");
        let request = prepare_without_discovery(&options).await.unwrap();
        assert_eq!(request.availability_zone, "nova");
        assert_eq!(request.size, 2);
    }

    #[tokio::test]
    async fn test_parameter_keys_are_case_insensitive() {
        let options = ProvisionOptions::new(claim("pvc", Some("2G")), "pv")
            .with_parameter("ZoNes", "nova")
            .with_parameter("TYPE", "default");
        let request = prepare_without_discovery(&options).await.unwrap();
        assert_eq!(request.availability_zone, "nova");
        assert_eq!(request.share_type.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_zone_chosen_from_parameter_list() {
        let zones = "nova1, nova2, nova3";
        let options =
            ProvisionOptions::new(claim("pvc", Some("2G")), "pv").with_parameter("zones", zones);
        let request = prepare_without_discovery(&options).await.unwrap();

        let set = zones_to_set(zones).unwrap();
        assert_eq!(request.availability_zone, choose_zone(&set, "pvc").unwrap());
    }

    #[tokio::test]
    async fn test_access_modes_do_not_affect_request() {
        let mut claim = claim("pvc", Some("2G"));
        if let Some(spec) = claim.spec.as_mut() {
            spec.access_modes = Some(vec!["ReadOnlyMany".to_string()]);
        }
        let options = ProvisionOptions::new(claim, "pv").with_parameter("zones", "nova");
        let request = prepare_without_discovery(&options).await.unwrap();
        assert_eq!(request.size, 2);
        assert_eq!(request.metadata, expected_metadata("pvc"));
    }

    #[tokio::test]
    async fn test_size_rounds_up() {
        for (storage, expected) in [("2Gi", 3), ("2.2G", 3), ("2G", 2)] {
            let options = ProvisionOptions::new(claim("pvc", Some(storage)), "pv")
                .with_parameter("zones", "nova");
            let request = prepare_without_discovery(&options).await.unwrap();
            assert_eq!(request.size, expected, "storage {storage}");
        }
    }

    #[tokio::test]
    async fn test_share_type_parameter() {
        let options = ProvisionOptions::new(claim("pvc", Some("2.2G")), "pv")
            .with_parameter("zones", "nova")
            .with_parameter("type", "default");
        let request = prepare_without_discovery(&options).await.unwrap();
        assert_eq!(request.share_type.as_deref(), Some("default"));
        assert_eq!(request.size, 3);
    }

    #[tokio::test]
    async fn test_unknown_parameter_rejected() {
        let options =
            ProvisionOptions::new(claim("pvc", Some("2G")), "pv").with_parameter("foo", "bar");
        assert_matches!(
            prepare(&options).await,
            Err(Error::InvalidParameter { key }) if key == "foo"
        );
    }

    #[tokio::test]
    async fn test_first_unknown_parameter_reported() {
        let options = ProvisionOptions::new(claim("pvc", Some("2G")), "pv")
            .with_parameter("alpha", "1")
            .with_parameter("beta", "2")
            .with_parameter("zones", ",");
        assert_matches!(
            prepare(&options).await,
            Err(Error::InvalidParameter { key }) if key == "alpha"
        );
    }

    #[tokio::test]
    async fn test_malformed_zone_list_rejected() {
        let options =
            ProvisionOptions::new(claim("pvc", Some("2G")), "pv").with_parameter("zones", "a,,b");
        let err = prepare(&options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_invalid_sizes_rejected() {
        for storage in ["0G", "-1G", "lots"] {
            let options = ProvisionOptions::new(claim("pvc", Some(storage)), "pv");
            let err = prepare(&options).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "storage {storage}");
        }
    }

    #[tokio::test]
    async fn test_missing_storage_request_rejected() {
        let options = ProvisionOptions::new(claim("pvc", None), "pv");
        assert_matches!(prepare(&options).await, Err(Error::Validation(_)));

        let mut no_spec = claim("pvc", None);
        no_spec.spec = None;
        let options = ProvisionOptions::new(no_spec, "pv");
        assert_matches!(prepare(&options).await, Err(Error::Validation(_)));

        let mut cpu_only = claim("pvc", None);
        if let Some(resources) = cpu_only.spec.as_mut().and_then(|s| s.resources.as_mut()) {
            resources.requests = Some(BTreeMap::from([(
                "cpu".to_string(),
                K8sQuantity("1".to_string()),
            )]));
        }
        let options = ProvisionOptions::new(cpu_only, "pv");
        assert_matches!(prepare(&options).await, Err(Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_claim_without_uid_rejected() {
        for uid in [None, Some(String::new())] {
            let mut claim = claim("pvc", Some("2G"));
            claim.metadata.uid = uid;
            let options = ProvisionOptions::new(claim, "pv").with_parameter("zones", "nova");
            assert_matches!(
                prepare_without_discovery(&options).await,
                Err(Error::Validation(msg)) if msg.contains("foo/pvc")
            );
        }
    }

    #[tokio::test]
    async fn test_discovery_error_propagates_unchanged() {
        let options = ProvisionOptions::new(claim("pvc", Some("2G")), "pv");
        let result = prepare_create_request(&options, || async {
            Err(Error::OpenStackApi {
                service: "compute".into(),
                reason: "zones unavailable".into(),
            })
        })
        .await;
        assert_matches!(
            result,
            Err(Error::OpenStackApi { service, .. }) if service == "compute"
        );
    }

    #[tokio::test]
    async fn test_empty_discovery_rejected() {
        let options = ProvisionOptions::new(claim("pvc", Some("2G")), "pv");
        let result = prepare_create_request(&options, || async { Ok(BTreeSet::new()) }).await;
        assert_matches!(result, Err(Error::Validation(_)));
    }
}
