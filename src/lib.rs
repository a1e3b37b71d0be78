//! Manila Provisioner
//!
//! Dynamic Kubernetes volume provisioner backed by OpenStack Manila NFS
//! shares.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                            Provisioner Pipeline                              │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │   Request   │─▶│   Create    │─▶│    Wait     │─▶│  Grant Access       │ │
//! │  │   Builder   │  │   Share     │  │  Available  │  │  (optional)         │ │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └──────────┬──────────┘ │
//! │                                                                │            │
//! │                   ┌─────────────────────┐  ┌───────────────────┴──────────┐ │
//! │                   │  Volume Assembler   │◀─│  Export Location Selector    │ │
//! │                   └─────────────────────┘  └──────────────────────────────┘ │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │                        Platform Adapters                                     │
//! │  ┌─────────────────────────────┐  ┌─────────────────────────────────────┐   │
//! │  │       Kubernetes            │  │           OpenStack                 │   │
//! │  │   (claims, nodes, PVs)      │  │   (Keystone, Manila v2)             │   │
//! │  └─────────────────────────────┘  └─────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`provisioner`]: Request building, readiness polling and volume assembly
//! - [`platform`]: Manila and Kubernetes adapters
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod domain;
pub mod error;
pub mod platform;
pub mod provisioner;

// Re-export commonly used types
pub use domain::ports::{
    AccessRequest, AccessRule, ApiVersion, CreateShareRequest, ExportLocation, Share,
    SharedFileSystemApi, SharedFileSystemApiRef, ZoneSource, ZoneSourceRef,
};

pub use error::{Error, ErrorAction, ErrorKind, Result};

pub use platform::{ClassSettings, ManilaClient, NodeZoneLister, OpenStackConfig, StaticZones};

pub use provisioner::{
    AccessConfig, Microversion, PollPolicy, ProvisionOptions, Provisioner, ProvisionerConfig,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
