//! ExtensionRegistry - resolves extension types from field metadata.

use crate::enumeration::{EnumerationCodec, ENUMERATION_EXTENSION_NAME};
use crate::ip::{IpCodec, IP_EXTENSION_NAME};
use crate::metadata::{extension_metadata, extension_name};
use crate::subnet::{SubnetCodec, SUBNET_EXTENSION_NAME};
use arrow::datatypes::{DataType, Field};
use rb_error::CodecError;
use std::collections::HashMap;
use tracing::debug;

/// A resolved extension type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionType {
    Ip,
    Subnet,
    Enumeration(EnumerationCodec),
}

impl ExtensionType {
    /// Extension name as stored in field metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ip => IP_EXTENSION_NAME,
            Self::Subnet => SUBNET_EXTENSION_NAME,
            Self::Enumeration(_) => ENUMERATION_EXTENSION_NAME,
        }
    }

    /// Physical storage type.
    pub fn storage_type(&self) -> DataType {
        match self {
            Self::Ip => IpCodec::storage_type(),
            Self::Subnet => SubnetCodec::storage_type(),
            Self::Enumeration(_) => EnumerationCodec::storage_type(),
        }
    }

    /// Builds a nullable field carrying this extension type.
    pub fn field(&self, name: &str) -> Result<Field, CodecError> {
        match self {
            Self::Ip => Ok(IpCodec::field(name)),
            Self::Subnet => Ok(SubnetCodec::field(name)),
            Self::Enumeration(codec) => codec.field(name),
        }
    }
}

/// Restores an extension type from storage and serialized metadata.
type Deserializer = fn(&DataType, &str) -> Result<ExtensionType, CodecError>;

/// Registry of known extension types.
///
/// Built once at process startup and passed by reference to the flattener,
/// the row projector and the array builders.
pub struct ExtensionRegistry {
    deserializers: HashMap<&'static str, Deserializer>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.deserializers.keys().collect();
        names.sort();
        f.debug_struct("ExtensionRegistry")
            .field("types", &names)
            .finish()
    }
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            deserializers: HashMap::new(),
        }
    }

    /// Creates a registry with the ip, subnet and enumeration types.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(IP_EXTENSION_NAME, |storage, metadata| {
            IpCodec::deserialize_metadata(storage, metadata).map(|()| ExtensionType::Ip)
        });
        registry.register(SUBNET_EXTENSION_NAME, |storage, metadata| {
            SubnetCodec::deserialize_metadata(storage, metadata).map(|()| ExtensionType::Subnet)
        });
        registry.register(ENUMERATION_EXTENSION_NAME, |storage, metadata| {
            EnumerationCodec::deserialize_metadata(storage, metadata)
                .map(ExtensionType::Enumeration)
        });
        registry
    }

    /// Registers a deserializer for an extension name.
    pub fn register(&mut self, name: &'static str, deserializer: Deserializer) {
        self.deserializers.insert(name, deserializer);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deserializers.contains_key(name)
    }

    /// Resolves the extension type of a field.
    ///
    /// Returns `Ok(None)` for plain fields and for extension names this
    /// registry does not know; those are treated as their storage type.
    pub fn resolve(&self, field: &Field) -> Result<Option<ExtensionType>, CodecError> {
        let Some(name) = extension_name(field) else {
            return Ok(None);
        };
        let Some(deserializer) = self.deserializers.get(name) else {
            debug!(field = %field.name(), extension = %name, "Unknown extension type, using storage");
            return Ok(None);
        };
        let metadata = extension_metadata(field).unwrap_or_default();
        deserializer(field.data_type(), metadata).map(Some)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
