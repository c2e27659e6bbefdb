//! IpCodec - 128-bit IP address storage with IPv4-mapped addresses.

use crate::metadata::annotate;
use arrow::array::{Array, FixedSizeBinaryArray};
use arrow::datatypes::{DataType, Field};
use rb_error::CodecError;
use std::net::{IpAddr, Ipv6Addr};

/// Extension name of the IP address type.
pub const IP_EXTENSION_NAME: &str = "tenzir.ip";

/// Width of a packed address in bytes.
const IP_WIDTH: i32 = 16;

/// Codec for the IP address extension type.
///
/// Every address occupies 16 bytes in network byte order. IPv4 addresses are
/// stored in their IPv4-mapped IPv6 form (`::ffff:a.b.c.d`) and come back out
/// as IPv4 when unpacked.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpCodec;

impl IpCodec {
    /// Physical storage type.
    pub fn storage_type() -> DataType {
        DataType::FixedSizeBinary(IP_WIDTH)
    }

    /// Builds a nullable field of this extension type.
    pub fn field(name: &str) -> Field {
        annotate(
            Field::new(name, Self::storage_type(), true),
            IP_EXTENSION_NAME,
            Self::serialize_metadata(),
        )
    }

    /// The serialized metadata is the type tag itself.
    pub fn serialize_metadata() -> String {
        IP_EXTENSION_NAME.to_string()
    }

    /// Checks serialized metadata and storage of a field claiming to be an IP.
    pub fn deserialize_metadata(storage: &DataType, metadata: &str) -> Result<(), CodecError> {
        if !metadata.is_empty() && metadata != IP_EXTENSION_NAME {
            return Err(CodecError::Mismatch {
                extension: IP_EXTENSION_NAME.to_string(),
                reason: format!("type identifier does not match: {metadata}"),
            });
        }
        if *storage != Self::storage_type() {
            return Err(CodecError::Mismatch {
                extension: IP_EXTENSION_NAME.to_string(),
                reason: format!("expected {}, found {storage}", Self::storage_type()),
            });
        }
        Ok(())
    }

    /// Packs an address into its 16-byte storage form.
    pub fn pack(address: IpAddr) -> [u8; 16] {
        match address {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        }
    }

    /// Unpacks 16 bytes; IPv4-mapped addresses are returned as IPv4.
    pub fn unpack(bytes: &[u8]) -> Result<IpAddr, CodecError> {
        let octets: [u8; 16] = bytes.try_into().map_err(|_| {
            CodecError::InvalidAddress(format!("expected 16 bytes, found {}", bytes.len()))
        })?;
        let v6 = Ipv6Addr::from(octets);
        Ok(match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        })
    }

    /// Builds a storage array from optional addresses.
    pub fn pack_array(values: &[Option<IpAddr>]) -> Result<FixedSizeBinaryArray, CodecError> {
        let packed = values.iter().map(|value| value.map(Self::pack));
        FixedSizeBinaryArray::try_from_sparse_iter_with_size(packed, IP_WIDTH)
            .map_err(|e| CodecError::InvalidAddress(e.to_string()))
    }

    /// Reads the address at `idx`, or `None` for a null slot.
    pub fn value(array: &FixedSizeBinaryArray, idx: usize) -> Result<Option<IpAddr>, CodecError> {
        if array.is_null(idx) {
            return Ok(None);
        }
        Self::unpack(array.value(idx)).map(Some)
    }
}
