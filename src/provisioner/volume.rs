//! PersistentVolume Assembly
//!
//! Publishes a ready share as an NFS-backed PersistentVolume.

use super::request::ProvisionOptions;
use crate::domain::ports::{ExportLocation, Share};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{NFSVolumeSource, PersistentVolume, PersistentVolumeSpec};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Annotation binding a volume to the Manila share backing it
pub const SHARE_ID_ANNOTATION: &str = "manila.external-storage.incubator.kubernetes.io/ID";

/// Access modes granted when the claim requests none
pub const DEFAULT_ACCESS_MODES: [&str; 3] = ["ReadWriteOnce", "ReadOnlyMany", "ReadWriteMany"];

/// Split an NFS export path into `(server, path)` at the first colon.
///
/// Bracketed IPv6 literals such as `[fd00::1]:/share` are not understood and
/// split inside the address.
pub fn split_export_path(export_path: &str) -> Result<(&str, &str)> {
    export_path
        .split_once(':')
        .ok_or_else(|| Error::InvalidExportPath {
            path: export_path.to_string(),
        })
}

/// Build the PersistentVolume for a provisioned share.
pub fn assemble_volume(
    options: &ProvisionOptions,
    share: &Share,
    location: &ExportLocation,
) -> Result<PersistentVolume> {
    let (server, path) = split_export_path(&location.path)?;

    let access_modes = match options
        .claim
        .spec
        .as_ref()
        .and_then(|spec| spec.access_modes.as_ref())
    {
        Some(modes) if !modes.is_empty() => modes.clone(),
        _ => DEFAULT_ACCESS_MODES.iter().map(|m| m.to_string()).collect(),
    };

    let capacity = BTreeMap::from([(
        "storage".to_string(),
        Quantity(format!("{}G", share.size)),
    )]);

    Ok(PersistentVolume {
        metadata: ObjectMeta {
            name: Some(options.volume_name.clone()),
            annotations: Some(BTreeMap::from([(
                SHARE_ID_ANNOTATION.to_string(),
                share.id.clone(),
            )])),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            persistent_volume_reclaim_policy: Some(options.reclaim_policy.clone()),
            access_modes: Some(access_modes),
            capacity: Some(capacity),
            nfs: Some(NFSVolumeSource {
                server: server.to_string(),
                path: path.to_string(),
                read_only: Some(false),
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Share ID recorded on a volume by [`assemble_volume`]
pub fn share_id_from_volume(volume: &PersistentVolume) -> Result<&str> {
    volume
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(SHARE_ID_ANNOTATION))
        .map(String::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::Validation(format!(
                "volume {:?} has no {SHARE_ID_ANNOTATION} annotation",
                volume.metadata.name.as_deref().unwrap_or_default()
            ))
        })
}
