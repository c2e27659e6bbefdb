//! SubnetCodec - `{address, length}` storage with the IPv4-mapped prefix fix-up.

use crate::ip::IpCodec;
use crate::metadata::annotate;
use arrow::array::{Array, ArrayRef, AsArray, StructArray, UInt8Array};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, Fields, UInt8Type};
use ip_network::{IpNetwork, Ipv4Network, Ipv6Network};
use rb_error::CodecError;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

/// Extension name of the subnet type.
pub const SUBNET_EXTENSION_NAME: &str = "tenzir.subnet";

/// Bits of the IPv4-mapped prefix in front of an IPv4 address.
const V4_MAPPED_BITS: u8 = 96;

/// Codec for the subnet extension type.
///
/// The network address goes through [`IpCodec`]. IPv4 networks store their
/// prefix length shifted by 96 so that it counts bits of the mapped 128-bit
/// address. On the way back a mapped address with a length below 96 is a
/// genuine IPv6 network (`::ffff:1234:0/80`), anything at or above 96 is IPv4.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubnetCodec;

impl SubnetCodec {
    fn storage_fields() -> Fields {
        Fields::from(vec![
            IpCodec::field("address"),
            Field::new("length", DataType::UInt8, true),
        ])
    }

    /// Physical storage type.
    pub fn storage_type() -> DataType {
        DataType::Struct(Self::storage_fields())
    }

    /// Builds a nullable field of this extension type.
    pub fn field(name: &str) -> Field {
        annotate(
            Field::new(name, Self::storage_type(), true),
            SUBNET_EXTENSION_NAME,
            Self::serialize_metadata(),
        )
    }

    pub fn serialize_metadata() -> String {
        SUBNET_EXTENSION_NAME.to_string()
    }

    /// Checks serialized metadata and storage of a field claiming to be a subnet.
    pub fn deserialize_metadata(storage: &DataType, metadata: &str) -> Result<(), CodecError> {
        let mismatch = |reason: String| CodecError::Mismatch {
            extension: SUBNET_EXTENSION_NAME.to_string(),
            reason,
        };
        if !metadata.is_empty() && metadata != SUBNET_EXTENSION_NAME {
            return Err(mismatch(format!("type identifier does not match: {metadata}")));
        }
        let DataType::Struct(fields) = storage else {
            return Err(mismatch(format!("expected a struct, found {storage}")));
        };
        let shape_ok = fields.len() == 2
            && fields[0].name() == "address"
            && *fields[0].data_type() == IpCodec::storage_type()
            && fields[1].name() == "length"
            && *fields[1].data_type() == DataType::UInt8;
        if !shape_ok {
            return Err(mismatch(format!(
                "expected {{address: fixed_size_binary[16], length: uint8}}, found {storage}"
            )));
        }
        Ok(())
    }

    /// Packs a network into its stored address and prefix length.
    pub fn pack(network: IpNetwork) -> ([u8; 16], u8) {
        match network {
            IpNetwork::V4(v4) => (
                IpCodec::pack(IpAddr::V4(v4.network_address())),
                v4.netmask() + V4_MAPPED_BITS,
            ),
            IpNetwork::V6(v6) => (IpCodec::pack(IpAddr::V6(v6.network_address())), v6.netmask()),
        }
    }

    /// Unpacks a stored address and prefix length.
    pub fn unpack(address: &[u8], length: u8) -> Result<IpNetwork, CodecError> {
        let octets: [u8; 16] = address.try_into().map_err(|_| {
            CodecError::InvalidAddress(format!("expected 16 bytes, found {}", address.len()))
        })?;
        let v6 = Ipv6Addr::from(octets);
        let network = match v6.to_ipv4_mapped() {
            Some(v4) if length >= V4_MAPPED_BITS => {
                Ipv4Network::new_truncate(v4, length - V4_MAPPED_BITS).map(IpNetwork::V4)
            }
            _ => Ipv6Network::new_truncate(v6, length).map(IpNetwork::V6),
        };
        network.map_err(|e| CodecError::InvalidSubnet(format!("{v6}/{length}: {e}")))
    }

    /// Builds a storage array from optional networks.
    pub fn pack_array(values: &[Option<IpNetwork>]) -> Result<StructArray, CodecError> {
        let packed: Vec<Option<([u8; 16], u8)>> =
            values.iter().map(|value| value.map(Self::pack)).collect();

        let addresses = arrow::array::FixedSizeBinaryArray::try_from_sparse_iter_with_size(
            packed.iter().map(|entry| entry.map(|(address, _)| address)),
            16,
        )
        .map_err(|e| CodecError::InvalidAddress(e.to_string()))?;
        let lengths: UInt8Array = packed.iter().map(|entry| entry.map(|(_, len)| len)).collect();
        let nulls = NullBuffer::from(values.iter().map(Option::is_some).collect::<Vec<_>>());

        let columns: Vec<ArrayRef> = vec![Arc::new(addresses), Arc::new(lengths)];
        StructArray::try_new(Self::storage_fields(), columns, Some(nulls)).map_err(|e| {
            CodecError::Mismatch {
                extension: SUBNET_EXTENSION_NAME.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Reads the network at `idx`. A null struct or a null child is a null subnet.
    pub fn value(array: &StructArray, idx: usize) -> Result<Option<IpNetwork>, CodecError> {
        if array.is_null(idx) || array.num_columns() != 2 {
            return Ok(None);
        }
        let addresses = array.column(0).as_fixed_size_binary();
        let lengths = array.column(1).as_primitive::<UInt8Type>();
        if addresses.is_null(idx) || lengths.is_null(idx) {
            return Ok(None);
        }
        Self::unpack(addresses.value(idx), lengths.value(idx)).map(Some)
    }
}
