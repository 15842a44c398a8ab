//! Unbound DNS objects.

pub mod host_override;

pub use host_override::{HostOverrideModel, HostOverrideResource};
