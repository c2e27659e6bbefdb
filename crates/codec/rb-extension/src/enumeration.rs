//! EnumerationCodec - dictionary-encoded enumerations with JSON member metadata.

use crate::metadata::annotate;
use arrow::array::{Array, ArrayRef, AsArray, DictionaryArray, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, UInt8Type};
use indexmap::IndexMap;
use rb_error::CodecError;
use std::sync::Arc;

/// Extension name of the enumeration type.
pub const ENUMERATION_EXTENSION_NAME: &str = "tenzir.enumeration";

/// Codec for the enumeration extension type.
///
/// Storage is `Dictionary(UInt8, Utf8)`. The metadata maps each member name
/// to its ordinal; the dictionary holds the name at the position of its
/// ordinal, with nulls filling unused ordinals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationCodec {
    members: IndexMap<String, u32>,
}

impl EnumerationCodec {
    /// Creates a codec from member names and ordinals.
    pub fn new<I, S>(members: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let members: IndexMap<String, u32> = members
            .into_iter()
            .map(|(name, ordinal)| (name.into(), ordinal))
            .collect();
        if let Some((name, ordinal)) = members
            .iter()
            .find(|(_, ordinal)| **ordinal > u32::from(u8::MAX))
        {
            return Err(CodecError::Metadata {
                extension: ENUMERATION_EXTENSION_NAME.to_string(),
                reason: format!("ordinal {ordinal} of '{name}' does not fit the uint8 index"),
            });
        }
        Ok(Self { members })
    }

    /// Member names and their ordinals, in metadata order.
    pub fn members(&self) -> &IndexMap<String, u32> {
        &self.members
    }

    /// Ordinal of a member name.
    pub fn ordinal(&self, name: &str) -> Option<u8> {
        self.members
            .get(name)
            .and_then(|ordinal| u8::try_from(*ordinal).ok())
    }

    /// Member name of an ordinal.
    pub fn name(&self, ordinal: u8) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, value)| **value == u32::from(ordinal))
            .map(|(name, _)| name.as_str())
    }

    pub fn is_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Physical storage type.
    pub fn storage_type() -> DataType {
        DataType::Dictionary(Box::new(DataType::UInt8), Box::new(DataType::Utf8))
    }

    /// Builds a nullable field of this enumeration.
    pub fn field(&self, name: &str) -> Result<Field, CodecError> {
        Ok(annotate(
            Field::new(name, Self::storage_type(), true),
            ENUMERATION_EXTENSION_NAME,
            self.serialize_metadata()?,
        ))
    }

    /// Serializes the member mapping as a JSON object.
    pub fn serialize_metadata(&self) -> Result<String, CodecError> {
        serde_json::to_string(&self.members).map_err(|e| CodecError::Metadata {
            extension: ENUMERATION_EXTENSION_NAME.to_string(),
            reason: e.to_string(),
        })
    }

    /// Restores a codec from its storage type and serialized metadata.
    pub fn deserialize_metadata(storage: &DataType, metadata: &str) -> Result<Self, CodecError> {
        if *storage != Self::storage_type() {
            return Err(CodecError::Mismatch {
                extension: ENUMERATION_EXTENSION_NAME.to_string(),
                reason: format!("expected {}, found {storage}", Self::storage_type()),
            });
        }
        let members: IndexMap<String, u32> =
            serde_json::from_str(metadata).map_err(|e| CodecError::Metadata {
                extension: ENUMERATION_EXTENSION_NAME.to_string(),
                reason: e.to_string(),
            })?;
        Self::new(members)
    }

    /// Dictionary with each member at its ordinal and nulls in the gaps.
    pub fn dictionary(&self) -> StringArray {
        let size = self
            .members
            .values()
            .max()
            .map_or(0, |max| *max as usize + 1);
        let mut slots: Vec<Option<&str>> = vec![None; size];
        for (name, ordinal) in &self.members {
            slots[*ordinal as usize] = Some(name.as_str());
        }
        StringArray::from(slots)
    }

    /// Packs member names into a dictionary array. Nulls stay null.
    pub fn pack_array(
        &self,
        names: &[Option<&str>],
    ) -> Result<DictionaryArray<UInt8Type>, CodecError> {
        let indices = names
            .iter()
            .map(|name| match name {
                None => Ok(None),
                Some(name) => self
                    .ordinal(name)
                    .map(Some)
                    .ok_or_else(|| CodecError::UnknownMember((*name).to_string())),
            })
            .collect::<Result<Vec<Option<u8>>, CodecError>>()?;

        let dictionary: ArrayRef = Arc::new(self.dictionary());
        DictionaryArray::try_new(UInt8Array::from(indices), dictionary).map_err(|e| {
            CodecError::Mismatch {
                extension: ENUMERATION_EXTENSION_NAME.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Reads the member name at `idx` from the array's own dictionary.
    pub fn value(array: &DictionaryArray<UInt8Type>, idx: usize) -> Option<String> {
        if array.is_null(idx) {
            return None;
        }
        let key = array.keys().value(idx) as usize;
        let names = array.values().as_string_opt::<i32>()?;
        if key >= names.len() || names.is_null(key) {
            return None;
        }
        Some(names.value(key).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity() -> EnumerationCodec {
        EnumerationCodec::new([("low", 0), ("medium", 1), ("critical", 3)]).unwrap()
    }

    #[test]
    fn test_metadata_round_trip() {
        let codec = severity();
        let metadata = codec.serialize_metadata().unwrap();

        assert_eq!(metadata, r#"{"low":0,"medium":1,"critical":3}"#);
        let restored =
            EnumerationCodec::deserialize_metadata(&EnumerationCodec::storage_type(), &metadata)
                .unwrap();
        assert_eq!(restored, codec);
    }

    #[test]
    fn test_dictionary_fills_gaps_with_null() {
        let dictionary = severity().dictionary();

        assert_eq!(dictionary.len(), 4);
        assert_eq!(dictionary.value(0), "low");
        assert_eq!(dictionary.value(1), "medium");
        assert!(dictionary.is_null(2));
        assert_eq!(dictionary.value(3), "critical");
    }

    #[test]
    fn test_pack_array() {
        let codec = severity();
        let array = codec
            .pack_array(&[Some("critical"), None, Some("low")])
            .unwrap();

        assert_eq!(array.len(), 3);
        assert_eq!(array.keys().value(0), 3);
        assert!(array.is_null(1));
        assert_eq!(EnumerationCodec::value(&array, 0).as_deref(), Some("critical"));
        assert_eq!(EnumerationCodec::value(&array, 1), None);
        assert_eq!(EnumerationCodec::value(&array, 2).as_deref(), Some("low"));
    }

    #[test]
    fn test_pack_unknown_member_fails() {
        let result = severity().pack_array(&[Some("bogus")]);
        assert!(matches!(result, Err(CodecError::UnknownMember(name)) if name == "bogus"));
    }

    #[test]
    fn test_storage_mismatch() {
        let wrong = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
        let result = EnumerationCodec::deserialize_metadata(&wrong, r#"{"a":0}"#);
        assert!(matches!(result, Err(CodecError::Mismatch { .. })));
    }

    #[test]
    fn test_ordinal_out_of_range() {
        assert!(EnumerationCodec::new([("huge", 300)]).is_err());
    }

    #[test]
    fn test_name_lookup() {
        let codec = severity();
        assert_eq!(codec.ordinal("medium"), Some(1));
        assert_eq!(codec.name(3), Some("critical"));
        assert_eq!(codec.name(2), None);
        assert!(codec.is_member("low"));
    }
}
