//! Interface records returned by the diagnostics API.

use serde::{Deserialize, Serialize};

/// A network interface as reported by `ifconfig` on the firewall.
///
/// `mtu` arrives as a string; everything list-shaped may contain empty
/// strings, which OPNsense uses as padding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interface {
    /// Device name, e.g. `em0`.
    pub device: String,
    /// Media type setting (ifmedia).
    pub media: String,
    /// Human readable media type.
    pub media_raw: String,
    /// Hardware address.
    #[serde(rename = "macaddr")]
    pub mac_addr: String,
    /// Whether this is a physical NIC.
    pub is_physical: bool,
    /// Maximum transmission unit, as a decimal string.
    pub mtu: String,
    /// Link status, e.g. `active`.
    pub status: String,
    /// ifconfig `flags=` entries.
    #[serde(default)]
    pub flags: Vec<String>,
    /// Supported capabilities.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// ifconfig `options=` entries.
    #[serde(default)]
    pub options: Vec<String>,
    /// Media types the NIC supports.
    #[serde(default)]
    pub supported_media: Vec<String>,
    /// Interface groups.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Bound IPv4 addresses, in API order.
    #[serde(default)]
    pub ipv4: Vec<Ipv4Address>,
    /// Bound IPv6 addresses, in API order.
    #[serde(default)]
    pub ipv6: Vec<Ipv6Address>,
}

/// An IPv4 address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ipv4Address {
    /// The address.
    #[serde(rename = "ipaddr")]
    pub ip_addr: String,
    /// Prefix length.
    #[serde(rename = "subnetbits")]
    pub subnet_bits: i64,
    /// Whether the address belongs to a tunnel.
    pub tunnel: bool,
}

/// An IPv6 address bound to an interface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ipv6Address {
    /// The address.
    #[serde(rename = "ipaddr")]
    pub ip_addr: String,
    /// Prefix length.
    #[serde(rename = "subnetbits")]
    pub subnet_bits: i64,
    /// Whether the address belongs to a tunnel.
    pub tunnel: bool,
    /// Whether the address was autoconfigured.
    pub autoconf: bool,
    /// Whether the address is deprecated.
    pub deprecated: bool,
    /// Whether the address is link-local.
    #[serde(rename = "link-local")]
    pub link_local: bool,
    /// Whether duplicate address detection is pending.
    pub tentative: bool,
}
