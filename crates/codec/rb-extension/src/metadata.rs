//! Field metadata keys carrying extension type information.

use arrow::datatypes::Field;
use std::collections::HashMap;

/// Field metadata key holding the extension type name.
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// Field metadata key holding the serialized extension metadata.
pub const EXTENSION_METADATA_KEY: &str = "ARROW:extension:metadata";

/// Returns the extension type name of a field, if it has one.
pub fn extension_name(field: &Field) -> Option<&str> {
    field.metadata().get(EXTENSION_NAME_KEY).map(String::as_str)
}

/// Returns the serialized extension metadata of a field, if present.
pub fn extension_metadata(field: &Field) -> Option<&str> {
    field
        .metadata()
        .get(EXTENSION_METADATA_KEY)
        .map(String::as_str)
}

/// Tags a field with an extension name and its serialized metadata.
pub(crate) fn annotate(field: Field, name: &str, metadata: String) -> Field {
    let mut entries: HashMap<String, String> = field.metadata().clone();
    entries.insert(EXTENSION_NAME_KEY.to_string(), name.to_string());
    entries.insert(EXTENSION_METADATA_KEY.to_string(), metadata);
    field.with_metadata(entries)
}
