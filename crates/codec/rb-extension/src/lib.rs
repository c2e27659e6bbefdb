//! Arrow extension type codecs for rowbridge.
//!
//! The host pipeline tags three logical types on top of plain Arrow storage:
//!
//! - [`IpCodec`] - `tenzir.ip`, 16-byte big-endian addresses, IPv4 stored
//!   IPv4-mapped
//! - [`SubnetCodec`] - `tenzir.subnet`, `{address, length}` structs
//! - [`EnumerationCodec`] - `tenzir.enumeration`, dictionary-encoded strings
//!   whose member ordinals travel as JSON metadata
//!
//! Extension types are recognised through the standard Arrow field metadata
//! keys. The [`ExtensionRegistry`] is built once at startup and handed to
//! everything that needs to interpret fields.

mod enumeration;
mod ip;
mod metadata;
mod registry;
mod subnet;

pub use enumeration::{EnumerationCodec, ENUMERATION_EXTENSION_NAME};
pub use ip::{IpCodec, IP_EXTENSION_NAME};
pub use metadata::{
    extension_metadata, extension_name, EXTENSION_METADATA_KEY, EXTENSION_NAME_KEY,
};
pub use registry::{ExtensionRegistry, ExtensionType};
pub use subnet::{SubnetCodec, SUBNET_EXTENSION_NAME};
