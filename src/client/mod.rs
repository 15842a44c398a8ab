//! The OPNsense client seam.
//!
//! Handlers never talk HTTP themselves. They call one of the async traits
//! below, one per OPNsense API area, and receive plain domain records. The
//! concrete client (transport, authentication, retries) lives outside this
//! crate and is injected as an `Arc` when the provider is constructed.
//!
//! [`ClientError::NotFound`] is the one error kind handlers treat
//! specially: a resource read that hits it drops the resource from state
//! instead of failing.

use async_trait::async_trait;
use thiserror::Error;

pub mod diagnostics;
pub mod ipsec;
pub mod unbound;

pub use diagnostics::{Interface, Ipv4Address, Ipv6Address};
pub use ipsec::IpsecVti;
pub use unbound::HostOverride;

/// Errors reported by an OPNsense client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The addressed object does not exist on the firewall.
    #[error("unable to find resource {0}, it may have been deleted upstream")]
    NotFound(String),

    /// OPNsense answered with a non-success status.
    #[error("OPNsense API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Body or reason returned by the API.
        message: String,
    },

    /// The request never completed (connection refused, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// OPNsense answered, but not in the shape the client expected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Returns `true` if this is the distinguished "not found" kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Read-only interface diagnostics (`/api/diagnostics/interface`).
#[async_trait]
pub trait DiagnosticsApi: Send + Sync {
    /// Fetch one interface by device name (e.g. `em0`).
    async fn get_interface(&self, device: &str) -> ClientResult<Interface>;

    /// Fetch every interface known to the firewall.
    async fn get_interface_all(&self) -> ClientResult<Vec<Interface>>;
}

/// IPsec virtual tunnel interfaces (`/api/ipsec/vti`).
#[async_trait]
pub trait IpsecApi: Send + Sync {
    /// Fetch a VTI by UUID.
    async fn get_ipsec_vti(&self, id: &str) -> ClientResult<IpsecVti>;

    /// Create a VTI, returning the UUID OPNsense assigned.
    async fn add_ipsec_vti(&self, vti: &IpsecVti) -> ClientResult<String>;

    /// Replace the VTI stored under `id`.
    async fn update_ipsec_vti(&self, id: &str, vti: &IpsecVti) -> ClientResult<()>;

    /// Delete the VTI stored under `id`.
    async fn delete_ipsec_vti(&self, id: &str) -> ClientResult<()>;
}

/// Unbound DNS host overrides (`/api/unbound/settings`).
#[async_trait]
pub trait UnboundApi: Send + Sync {
    /// Fetch a host override by UUID.
    async fn get_host_override(&self, id: &str) -> ClientResult<HostOverride>;

    /// Create a host override, returning the UUID OPNsense assigned.
    async fn add_host_override(&self, host: &HostOverride) -> ClientResult<String>;

    /// Replace the host override stored under `id`.
    async fn update_host_override(&self, id: &str, host: &HostOverride) -> ClientResult<()>;

    /// Delete the host override stored under `id`.
    async fn delete_host_override(&self, id: &str) -> ClientResult<()>;
}

/// A client covering every API area the provider manages.
pub trait OpnsenseClient: DiagnosticsApi + IpsecApi + UnboundApi {}

impl<T> OpnsenseClient for T where T: DiagnosticsApi + IpsecApi + UnboundApi {}
