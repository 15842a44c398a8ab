//! Read-only interface diagnostics.

pub mod interface;
pub mod interface_all;

pub use interface::{InterfaceDataSource, InterfaceModel, Ipv4Model, Ipv6Model};
pub use interface_all::{InterfaceAllDataSource, InterfaceAllModel};
