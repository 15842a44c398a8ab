//! IPsec records.

use serde::{Deserialize, Serialize};

/// A virtual tunnel interface used by route-based IPsec connections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IpsecVti {
    /// `"1"` when enabled, `"0"` otherwise.
    pub enabled: String,
    /// Request id tying the VTI to a child SA.
    #[serde(rename = "reqid")]
    pub request_id: String,
    /// Local endpoint address.
    #[serde(rename = "local")]
    pub local_ip: String,
    /// Remote endpoint address.
    #[serde(rename = "remote")]
    pub remote_ip: String,
    /// Local tunnel address.
    #[serde(rename = "tunnel_local")]
    pub tunnel_local_ip: String,
    /// Remote tunnel address.
    #[serde(rename = "tunnel_remote")]
    pub tunnel_remote_ip: String,
    /// Second local tunnel address.
    #[serde(rename = "tunnel_local2")]
    pub tunnel_local_ip2: String,
    /// Second remote tunnel address.
    #[serde(rename = "tunnel_remote2")]
    pub tunnel_remote_ip2: String,
    /// Free-form description.
    pub description: String,
}
