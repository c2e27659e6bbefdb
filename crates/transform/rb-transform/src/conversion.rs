//! Value <-> Rhai Dynamic conversion.

use crate::path::FieldPath;
use crate::value::Value;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use ip_network::IpNetwork;
use rhai::{Array, Blob, Dynamic, FnPtr, Map};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::warn;

/// Converts a row value into a Rhai value.
///
/// Unsigned integers become Rhai integers when they fit. Time, duration, ip
/// and subnet values are passed as custom types.
pub fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Int(i) => Dynamic::from(*i),
        Value::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Dynamic::from(i),
            Err(_) => Dynamic::from(*u),
        },
        Value::Float(f) => Dynamic::from(*f),
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Blob(bytes) => Dynamic::from_blob(bytes.clone()),
        Value::Time(time) => Dynamic::from(*time),
        Value::Duration(duration) => Dynamic::from(*duration),
        Value::Ip(address) => Dynamic::from(*address),
        Value::Subnet(network) => Dynamic::from(*network),
        Value::List(items) => Dynamic::from_array(items.iter().map(value_to_dynamic).collect()),
        Value::Record(fields) => Dynamic::from_map(record_to_map(fields)),
    }
}

/// Converts a record into a Rhai object map.
pub fn record_to_map(fields: &IndexMap<String, Value>) -> Map {
    fields
        .iter()
        .map(|(key, value)| (key.as_str().into(), value_to_dynamic(value)))
        .collect()
}

/// Converts a Rhai value back into a row value.
///
/// Returns `None` for function pointers, which are never written back.
pub fn dynamic_to_value(value: Dynamic) -> Option<Value> {
    if value.is::<FnPtr>() {
        return None;
    }
    if value.is_unit() {
        return Some(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Some(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Some(Value::Int(i));
    }
    if let Ok(f) = value.as_float() {
        return Some(Value::Float(f));
    }
    if let Ok(c) = value.as_char() {
        return Some(Value::String(c.to_string()));
    }
    if value.is_string() {
        return value.into_string().ok().map(Value::String);
    }
    if value.is_blob() {
        return value.try_cast::<Blob>().map(Value::Blob);
    }
    if value.is_array() {
        let items = value.try_cast::<Array>()?;
        return Some(Value::List(
            items.into_iter().filter_map(dynamic_to_value).collect(),
        ));
    }
    if value.is_map() {
        return value.try_cast::<Map>().map(|map| Value::Record(map_to_record(map)));
    }
    if value.is::<IpAddr>() {
        return value.try_cast::<IpAddr>().map(Value::Ip);
    }
    if value.is::<IpNetwork>() {
        return value.try_cast::<IpNetwork>().map(Value::Subnet);
    }
    if value.is::<DateTime<Utc>>() {
        return value.try_cast::<DateTime<Utc>>().map(Value::Time);
    }
    if value.is::<TimeDelta>() {
        return value.try_cast::<TimeDelta>().map(Value::Duration);
    }
    if value.is::<u64>() {
        return value.try_cast::<u64>().map(Value::UInt);
    }

    warn!(type_name = %value.type_name(), "Unsupported Rhai value, converting to string");
    Some(Value::String(value.to_string()))
}

/// Converts a Rhai object map into a record, dropping function pointers.
pub fn map_to_record(map: Map) -> IndexMap<String, Value> {
    map_to_record_skipping(map, &FieldPath::row(), &mut HashSet::new())
}

/// Like [`map_to_record`], but adds the path of every dropped function
/// pointer below `prefix` to `skipped`.
pub fn map_to_record_skipping(
    map: Map,
    prefix: &FieldPath,
    skipped: &mut HashSet<FieldPath>,
) -> IndexMap<String, Value> {
    let mut record = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let path = prefix.child(key.as_str());
        if value.is::<FnPtr>() {
            skipped.insert(path);
            continue;
        }
        let value = if value.is_map() {
            value
                .try_cast::<Map>()
                .map(|nested| Value::Record(map_to_record_skipping(nested, &path, skipped)))
        } else {
            dynamic_to_value(value)
        };
        if let Some(value) = value {
            record.insert(key.to_string(), value);
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let values = [
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::Float(1.5),
            Value::from("text"),
            Value::Blob(vec![0, 1, 2]),
            Value::Time(DateTime::from_timestamp_nanos(1_700_000_000_123_456_789)),
            Value::Duration(TimeDelta::milliseconds(250)),
            Value::Ip("fe80::1ff:fe23:4567:890a".parse().unwrap()),
            Value::Subnet("10.1.20.0/25".parse().unwrap()),
        ];
        for value in values {
            assert_eq!(dynamic_to_value(value_to_dynamic(&value)), Some(value));
        }
    }

    #[test]
    fn test_unsigned_integers() {
        assert_eq!(
            dynamic_to_value(value_to_dynamic(&Value::UInt(7))),
            Some(Value::Int(7))
        );
        assert_eq!(
            dynamic_to_value(value_to_dynamic(&Value::UInt(u64::MAX))),
            Some(Value::UInt(u64::MAX))
        );
    }

    #[test]
    fn test_nested_record() {
        let record = Value::Record(IndexMap::from([
            ("a".to_string(), Value::Int(1)),
            (
                "tags".to_string(),
                Value::List(vec![Value::from("x"), Value::Null]),
            ),
        ]));
        let dynamic = value_to_dynamic(&record);
        assert!(dynamic.is_map());
        assert_eq!(dynamic_to_value(dynamic), Some(record));
    }

    #[test]
    fn test_function_pointers_are_dropped() {
        let mut map = Map::new();
        map.insert("f".into(), Dynamic::from(FnPtr::new("foo").unwrap()));
        map.insert("x".into(), Dynamic::from(1_i64));

        let record = map_to_record(map);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("x"), Some(&Value::Int(1)));
        assert_eq!(dynamic_to_value(Dynamic::from(FnPtr::new("foo").unwrap())), None);
    }

    #[test]
    fn test_skipped_function_paths() {
        let mut nested = Map::new();
        nested.insert("g".into(), Dynamic::from(FnPtr::new("bar").unwrap()));
        nested.insert("y".into(), Dynamic::from(2_i64));
        let mut map = Map::new();
        map.insert("f".into(), Dynamic::from(FnPtr::new("foo").unwrap()));
        map.insert("p".into(), Dynamic::from_map(nested));

        let mut skipped = HashSet::new();
        let record = map_to_record_skipping(map, &FieldPath::row(), &mut skipped);

        assert_eq!(
            record.get("p"),
            Some(&Value::Record(IndexMap::from([("y".to_string(), Value::Int(2))])))
        );
        assert!(!record.contains_key("f"));
        assert_eq!(
            skipped,
            HashSet::from([FieldPath::from(["f"]), FieldPath::from(["p", "g"])])
        );
    }

    #[test]
    fn test_char_becomes_string() {
        assert_eq!(
            dynamic_to_value(Dynamic::from('c')),
            Some(Value::String("c".to_string()))
        );
    }
}
