//! IPsec objects.

pub mod vti;

pub use vti::{IpsecVtiModel, IpsecVtiResource};
