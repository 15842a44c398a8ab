//! Unbound DNS records.

use serde::{Deserialize, Serialize};

/// A host override: a locally answered A, AAAA or MX record.
///
/// Every field is a string on the wire, including the `"1"`/`"0"` enabled
/// flag and the MX priority (empty when unset).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HostOverride {
    /// `"1"` when enabled.
    pub enabled: String,
    /// Host part, `*` for a wildcard.
    pub hostname: String,
    /// Domain part.
    pub domain: String,
    /// Record type: `A`, `AAAA` or `MX`.
    #[serde(rename = "rr")]
    pub record_type: String,
    /// Answer address for A/AAAA records.
    pub server: String,
    /// MX priority, empty when unset.
    #[serde(rename = "mxprio")]
    pub mx_priority: String,
    /// MX target host.
    #[serde(rename = "mx")]
    pub mx_domain: String,
    /// Free-form description.
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let host = HostOverride {
            enabled: "1".into(),
            hostname: "mail".into(),
            domain: "example.com".into(),
            record_type: "MX".into(),
            server: String::new(),
            mx_priority: "10".into(),
            mx_domain: "mx.example.com".into(),
            description: String::new(),
        };

        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value["rr"], json!("MX"));
        assert_eq!(value["mxprio"], json!("10"));
        assert_eq!(value["mx"], json!("mx.example.com"));
    }
}
