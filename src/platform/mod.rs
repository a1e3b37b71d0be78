//! Platform Adapters
//!
//! Implementations of the domain ports against OpenStack Manila and the
//! Kubernetes API.

pub mod kubernetes;
pub mod openstack;

pub use kubernetes::{ClassSettings, NodeZoneLister, StaticZones};
pub use openstack::{ManilaClient, OpenStackConfig};
