//! `opnsense_interface` data source.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{DiagnosticsApi, Interface, Ipv4Address, Ipv6Address};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::service::tools::{set_to_string_slice, string_slice_to_set, string_to_int64_null};
use crate::service::{decode, DataSource};

const TYPE_SUFFIX: &str = "interface";

// =========================================================================
// Model
// =========================================================================

/// State of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceModel {
    /// Device name, e.g. `em0`.
    pub device: Option<String>,
    /// Media type setting.
    pub media: Option<String>,
    /// Human readable media type.
    pub media_raw: Option<String>,
    /// Hardware address.
    pub macaddr: Option<String>,
    /// Whether this is a physical NIC.
    pub is_physical: Option<bool>,
    /// Maximum transmission unit; null when OPNsense reports none.
    pub mtu: Option<i64>,
    /// Link status.
    pub status: Option<String>,

    /// Interface flags.
    pub flags: Option<BTreeSet<String>>,
    /// Supported capabilities.
    pub capabilities: Option<BTreeSet<String>>,
    /// Enabled options.
    pub options: Option<BTreeSet<String>>,
    /// Media types the NIC supports.
    pub supported_media: Option<BTreeSet<String>>,
    /// Interface groups.
    pub groups: Option<BTreeSet<String>>,

    /// Bound IPv4 addresses, in API order.
    pub ipv4: Option<Vec<Ipv4Model>>,
    /// Bound IPv6 addresses, in API order.
    pub ipv6: Option<Vec<Ipv6Model>>,
}

/// State of one IPv4 address entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Model {
    /// The address.
    pub ipaddr: Option<String>,
    /// Prefix length.
    pub subnetbits: Option<i64>,
    /// Whether the address belongs to a tunnel.
    pub tunnel: Option<bool>,
}

/// State of one IPv6 address entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Model {
    /// The address.
    pub ipaddr: Option<String>,
    /// Prefix length.
    pub subnetbits: Option<i64>,
    /// Whether the address belongs to a tunnel.
    pub tunnel: Option<bool>,
    /// Whether the address was autoconfigured.
    pub autoconf: Option<bool>,
    /// Whether the address is deprecated.
    pub deprecated: Option<bool>,
    /// Whether the address is link-local.
    pub link_local: Option<bool>,
    /// Whether duplicate address detection is pending.
    pub tentative: Option<bool>,
}

impl InterfaceModel {
    /// Convert an API record into state.
    ///
    /// A non-numeric `mtu` becomes null. Address lists are always present,
    /// empty rather than null when the interface has no addresses.
    pub fn from_record(d: &Interface) -> Result<Self, ProviderError> {
        Ok(Self {
            device: Some(d.device.clone()),
            media: Some(d.media.clone()),
            media_raw: Some(d.media_raw.clone()),
            macaddr: Some(d.mac_addr.clone()),
            is_physical: Some(d.is_physical),
            mtu: string_to_int64_null(&d.mtu),
            status: Some(d.status.clone()),
            flags: Some(string_slice_to_set(&d.flags)),
            capabilities: Some(string_slice_to_set(&d.capabilities)),
            options: Some(string_slice_to_set(&d.options)),
            supported_media: Some(string_slice_to_set(&d.supported_media)),
            groups: Some(string_slice_to_set(&d.groups)),
            ipv4: Some(d.ipv4.iter().map(Ipv4Model::from_record).collect()),
            ipv6: Some(d.ipv6.iter().map(Ipv6Model::from_record).collect()),
        })
    }

    /// Convert state back into an API record.
    pub fn to_record(&self) -> Result<Interface, ProviderError> {
        Ok(Interface {
            device: self.device.clone().unwrap_or_default(),
            media: self.media.clone().unwrap_or_default(),
            media_raw: self.media_raw.clone().unwrap_or_default(),
            mac_addr: self.macaddr.clone().unwrap_or_default(),
            is_physical: self.is_physical.unwrap_or_default(),
            mtu: self.mtu.map(|m| m.to_string()).unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            flags: set_to_string_slice(&self.flags),
            capabilities: set_to_string_slice(&self.capabilities),
            options: set_to_string_slice(&self.options),
            supported_media: set_to_string_slice(&self.supported_media),
            groups: set_to_string_slice(&self.groups),
            ipv4: self.ipv4.iter().flatten().map(Ipv4Model::to_record).collect(),
            ipv6: self.ipv6.iter().flatten().map(Ipv6Model::to_record).collect(),
        })
    }
}

impl Ipv4Model {
    fn from_record(a: &Ipv4Address) -> Self {
        Self {
            ipaddr: Some(a.ip_addr.clone()),
            subnetbits: Some(a.subnet_bits),
            tunnel: Some(a.tunnel),
        }
    }

    fn to_record(&self) -> Ipv4Address {
        Ipv4Address {
            ip_addr: self.ipaddr.clone().unwrap_or_default(),
            subnet_bits: self.subnetbits.unwrap_or_default(),
            tunnel: self.tunnel.unwrap_or_default(),
        }
    }
}

impl Ipv6Model {
    fn from_record(a: &Ipv6Address) -> Self {
        Self {
            ipaddr: Some(a.ip_addr.clone()),
            subnetbits: Some(a.subnet_bits),
            tunnel: Some(a.tunnel),
            autoconf: Some(a.autoconf),
            deprecated: Some(a.deprecated),
            link_local: Some(a.link_local),
            tentative: Some(a.tentative),
        }
    }

    fn to_record(&self) -> Ipv6Address {
        Ipv6Address {
            ip_addr: self.ipaddr.clone().unwrap_or_default(),
            subnet_bits: self.subnetbits.unwrap_or_default(),
            tunnel: self.tunnel.unwrap_or_default(),
            autoconf: self.autoconf.unwrap_or_default(),
            deprecated: self.deprecated.unwrap_or_default(),
            link_local: self.link_local.unwrap_or_default(),
            tentative: self.tentative.unwrap_or_default(),
        }
    }
}

// =========================================================================
// Schema
// =========================================================================

/// Schema of the `opnsense_interface` data source.
pub fn interface_data_source_schema() -> Schema {
    let block = interface_block(
        Attribute::required_string().with_description("Name of the interface device."),
    );
    Schema {
        version: 0,
        block: block.with_description(
            "Interfaces can be used to get configurations of OPNsense interfaces.",
        ),
    }
}

/// Attributes of one interface. Everything but `device` is computed.
pub(crate) fn interface_block(device: Attribute) -> Block {
    Block::new()
        .with_attribute("device", device)
        .with_attribute(
            "media",
            Attribute::computed_string().with_description(
                "Interface media type settings (see https://man.openbsd.org/ifmedia.4).",
            ),
        )
        .with_attribute(
            "media_raw",
            Attribute::computed_string().with_description("User-friendly interface media type."),
        )
        .with_attribute(
            "macaddr",
            Attribute::computed_string().with_description("MAC address assigned to the interface."),
        )
        .with_attribute(
            "is_physical",
            Attribute::computed_bool()
                .with_description("Whether the interface is physical or virtual."),
        )
        .with_attribute(
            "mtu",
            Attribute::computed_int64().with_description(
                "Maximum Transmission Unit for the interface. This is typically 1500 bytes but can vary in some circumstances.",
            ),
        )
        .with_attribute(
            "status",
            Attribute::computed_string()
                .with_description("Status of the interface (e.g. `\"active\"`)."),
        )
        .with_attribute(
            "flags",
            Attribute::computed_string_set().with_description(
                "List of flags configured on the interface (equiv. to flags=xxxx in output of ifconfig).",
            ),
        )
        .with_attribute(
            "capabilities",
            Attribute::computed_string_set()
                .with_description("List of capabilities the interface supports."),
        )
        .with_attribute(
            "options",
            Attribute::computed_string_set().with_description(
                "List of options configured on the interface (equiv. to options=xx in output of ifconfig).",
            ),
        )
        .with_attribute(
            "supported_media",
            Attribute::computed_string_set().with_description(
                "List of supported media type settings (see https://man.openbsd.org/ifmedia.4).",
            ),
        )
        .with_attribute(
            "groups",
            Attribute::computed_string_set()
                .with_description("List of groups the interface is a member of."),
        )
        .with_block("ipv4", NestedBlock::computed_list(ipv4_block()))
        .with_block("ipv6", NestedBlock::computed_list(ipv6_block()))
}

fn ipv4_block() -> Block {
    Block::new()
        .with_attribute(
            "ipaddr",
            Attribute::computed_string()
                .with_description("IPv4 address assigned to the interface."),
        )
        .with_attribute(
            "subnetbits",
            Attribute::computed_int64().with_description("Number of subnet bits (i.e. CIDR)."),
        )
        .with_attribute(
            "tunnel",
            Attribute::computed_bool().with_description("Whether IPv4 tunnelling is enabled."),
        )
}

fn ipv6_block() -> Block {
    Block::new()
        .with_attribute(
            "ipaddr",
            Attribute::computed_string()
                .with_description("IPv6 address assigned to the interface."),
        )
        .with_attribute(
            "subnetbits",
            Attribute::computed_int64().with_description("Number of subnet bits (i.e. CIDR)."),
        )
        .with_attribute(
            "tunnel",
            Attribute::computed_bool().with_description("Whether IPv6 tunnelling is enabled."),
        )
        .with_attribute(
            "autoconf",
            Attribute::computed_bool()
                .with_description("Whether auto-configuration is enabled for the address."),
        )
        .with_attribute(
            "deprecated",
            Attribute::computed_bool().with_description("Whether the address is deprecated."),
        )
        .with_attribute(
            "link_local",
            Attribute::computed_bool().with_description("Whether the address is link-local."),
        )
        .with_attribute(
            "tentative",
            Attribute::computed_bool().with_description("Whether the address is tentative."),
        )
}

// =========================================================================
// Data source
// =========================================================================

#[derive(Deserialize)]
struct InterfaceConfig {
    device: Option<String>,
}

/// Looks up a single interface by device name.
pub struct InterfaceDataSource {
    client: Arc<dyn DiagnosticsApi>,
}

impl InterfaceDataSource {
    /// Build the data source around a diagnostics client.
    pub fn new(client: Arc<dyn DiagnosticsApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for InterfaceDataSource {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_{}", provider_type_name, TYPE_SUFFIX)
    }

    fn schema(&self) -> Schema {
        interface_data_source_schema()
    }

    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let config: InterfaceConfig = decode(config)?;
        let device = config
            .device
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest("missing device".to_string()))?;

        let iface = self
            .client
            .get_interface(&device)
            .await
            .map_err(|e| ProviderError::client("read interface", e))?;
        debug!(%device, "read interface");

        let model = InterfaceModel::from_record(&iface)?;
        serde_json::to_value(&model).map_err(|e| ProviderError::conversion("interface", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::schema::AttributeType;
    use crate::testing::MockOpnsense;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn em0() -> Interface {
        Interface {
            device: "em0".into(),
            media: "autoselect".into(),
            media_raw: "Ethernet autoselect (1000baseT <full-duplex>)".into(),
            mac_addr: "00:0c:29:aa:bb:cc".into(),
            is_physical: true,
            mtu: "1500".into(),
            status: "active".into(),
            flags: vec!["BROADCAST".into(), "RUNNING".into(), "UP".into()],
            capabilities: vec!["vlan_mtu".into()],
            options: vec!["rxcsum".into(), "txcsum".into()],
            supported_media: vec!["autoselect".into()],
            groups: vec!["lan".into()],
            ipv4: vec![Ipv4Address {
                ip_addr: "192.168.1.1".into(),
                subnet_bits: 24,
                tunnel: false,
            }],
            ipv6: vec![Ipv6Address {
                ip_addr: "fe80::20c:29ff:feaa:bbcc".into(),
                subnet_bits: 64,
                link_local: true,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_minimal_record() {
        let record = Interface {
            device: "em0".into(),
            mtu: "1500".into(),
            flags: vec!["UP".into(), "RUNNING".into()],
            ..Default::default()
        };

        let model = InterfaceModel::from_record(&record).unwrap();
        assert_eq!(model.device.as_deref(), Some("em0"));
        assert_eq!(model.mtu, Some(1500));
        assert_eq!(
            model.flags,
            Some(BTreeSet::from(["RUNNING".to_string(), "UP".to_string()]))
        );
        assert_eq!(model.ipv4, Some(vec![]));

        let state = serde_json::to_value(&model).unwrap();
        assert_eq!(state["ipv4"], json!([]));
        assert_eq!(state["ipv6"], json!([]));
        assert_eq!(state["mtu"], json!(1500));
    }

    #[test]
    fn test_bad_mtu_is_null() {
        let record = Interface {
            mtu: "n/a".into(),
            ..Default::default()
        };
        let model = InterfaceModel::from_record(&record).unwrap();
        assert_eq!(model.mtu, None);
        assert_eq!(serde_json::to_value(&model).unwrap()["mtu"], Value::Null);
    }

    #[test]
    fn test_sets_drop_padding_and_ignore_order() {
        let a = Interface {
            groups: vec!["wan".into(), "".into(), "lan".into()],
            ..Default::default()
        };
        let b = Interface {
            groups: vec!["lan".into(), "wan".into()],
            ..Default::default()
        };

        let a = InterfaceModel::from_record(&a).unwrap();
        let b = InterfaceModel::from_record(&b).unwrap();
        assert_eq!(a.groups, b.groups);
        assert_eq!(a.groups.map(|g| g.len()), Some(2));
    }

    #[test]
    fn test_round_trip() {
        let record = em0();
        let model = InterfaceModel::from_record(&record).unwrap();
        assert_eq!(model.to_record().unwrap(), record);
    }

    #[test]
    fn test_state_matches_schema_keys() {
        let model = InterfaceModel::from_record(&em0()).unwrap();
        let state = serde_json::to_value(&model).unwrap();

        let AttributeType::Object(attrs) = interface_data_source_schema().block.object_type()
        else {
            panic!("expected object type");
        };
        let mut declared: Vec<_> = attrs.keys().cloned().collect();
        declared.sort();
        let mut encoded: Vec<_> = state.as_object().unwrap().keys().cloned().collect();
        encoded.sort();
        assert_eq!(encoded, declared);

        let ipv6 = state["ipv6"][0].as_object().unwrap();
        assert!(ipv6.contains_key("link_local"));
        assert_eq!(ipv6.len(), 7);
    }

    #[test]
    fn test_schema_flags() {
        let schema = interface_data_source_schema();
        assert!(schema.block.attributes["device"].flags.required);
        assert!(schema.block.attributes["mtu"].flags.is_computed_only());
        assert!(schema.block.blocks["ipv4"].flags.is_computed_only());
    }

    #[tokio::test]
    async fn test_read() {
        let mock = Arc::new(MockOpnsense::new().with_interface(em0()));
        let ds = InterfaceDataSource::new(mock.clone());

        assert_eq!(ds.metadata("opnsense"), "opnsense_interface");

        let state = ds.read(json!({"device": "em0"})).await.unwrap();
        assert_eq!(state["macaddr"], json!("00:0c:29:aa:bb:cc"));
        assert_eq!(state["ipv4"][0]["subnetbits"], json!(24));
        assert_eq!(mock.calls(), vec!["get_interface em0"]);
    }

    #[tokio::test]
    async fn test_read_missing_device() {
        let ds = InterfaceDataSource::new(Arc::new(MockOpnsense::new()));

        let err = ds.read(json!({"device": "igb7"})).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Unable to read interface, got error: unable to find resource igb7, it may have been deleted upstream"
        );

        let err = ds.read(json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_read_client_failure() {
        let mock = Arc::new(MockOpnsense::new().with_interface(em0()));
        mock.fail_next(ClientError::Transport("connection refused".into()));
        let ds = InterfaceDataSource::new(mock);

        let err = ds.read(json!({"device": "em0"})).await.unwrap_err();
        assert_eq!(err.summary(), "Client Error");
    }
}
