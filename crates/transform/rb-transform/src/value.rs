//! Row values and their extraction from Arrow arrays.

use arrow::array::*;
use arrow::datatypes::{
    DataType, DurationMicrosecondType, DurationMillisecondType, DurationNanosecondType,
    DurationSecondType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::array_value_to_string;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use ip_network::IpNetwork;
use rb_error::Result;
use rb_extension::{EnumerationCodec, ExtensionRegistry, ExtensionType, IpCodec, SubnetCodec};
use std::net::IpAddr;
use tracing::warn;

/// A single value of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
    Time(DateTime<Utc>),
    Duration(TimeDelta),
    Ip(IpAddr),
    Subnet(IpNetwork),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::Time(_) => "time",
            Value::Duration(_) => "duration",
            Value::Ip(_) => "ip",
            Value::Subnet(_) => "subnet",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    /// Equality that treats a signed and an unsigned integer of the same
    /// value as equal, also inside lists and records. Floats compare by
    /// their bits, so NaN equals itself.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Int(i), Value::UInt(u)) | (Value::UInt(u), Value::Int(i)) => {
                u64::try_from(*i).is_ok_and(|i| i == *u)
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.equivalent(y)))
            }
            _ => self == other,
        }
    }

    /// Reads the value at `idx` of `array`, resolving extension types
    /// declared on `field`.
    pub fn from_field(
        registry: &ExtensionRegistry,
        field: &Field,
        array: &dyn Array,
        idx: usize,
    ) -> Result<Value> {
        let extension = registry.resolve(field)?;
        Value::from_array(registry, extension.as_ref(), array, idx)
    }

    /// Reads the value at `idx` of `array` whose extension type, if any,
    /// is already resolved. The registry is consulted for nested fields only.
    pub fn from_array(
        registry: &ExtensionRegistry,
        extension: Option<&ExtensionType>,
        array: &dyn Array,
        idx: usize,
    ) -> Result<Value> {
        if array.is_null(idx) {
            return Ok(Value::Null);
        }

        if let Some(extension) = extension {
            let value = match extension {
                ExtensionType::Ip => IpCodec::value(array.as_fixed_size_binary(), idx)?
                    .map_or(Value::Null, Value::Ip),
                ExtensionType::Subnet => SubnetCodec::value(array.as_struct(), idx)?
                    .map_or(Value::Null, Value::Subnet),
                ExtensionType::Enumeration(_) => {
                    EnumerationCodec::value(array.as_dictionary::<UInt8Type>(), idx)
                        .map_or(Value::Null, Value::String)
                }
            };
            return Ok(value);
        }

        let value = match array.data_type() {
            DataType::Null => Value::Null,
            DataType::Boolean => Value::Bool(array.as_boolean().value(idx)),
            DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(idx).into()),
            DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(idx).into()),
            DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(idx).into()),
            DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(idx)),
            DataType::UInt8 => Value::Int(array.as_primitive::<UInt8Type>().value(idx).into()),
            DataType::UInt16 => Value::Int(array.as_primitive::<UInt16Type>().value(idx).into()),
            DataType::UInt32 => Value::Int(array.as_primitive::<UInt32Type>().value(idx).into()),
            DataType::UInt64 => Value::UInt(array.as_primitive::<UInt64Type>().value(idx)),
            DataType::Float32 => {
                Value::Float(array.as_primitive::<Float32Type>().value(idx).into())
            }
            DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(idx)),
            DataType::Utf8 => Value::String(array.as_string::<i32>().value(idx).to_string()),
            DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(idx).to_string()),
            DataType::Binary => Value::Blob(array.as_binary::<i32>().value(idx).to_vec()),
            DataType::LargeBinary => Value::Blob(array.as_binary::<i64>().value(idx).to_vec()),
            DataType::FixedSizeBinary(_) => {
                Value::Blob(array.as_fixed_size_binary().value(idx).to_vec())
            }
            DataType::Timestamp(unit, _) => {
                let raw = timestamp_value(array, unit, idx);
                Value::Time(DateTime::from_timestamp_nanos(to_nanos(raw, unit)))
            }
            DataType::Duration(unit) => {
                let raw = duration_value(array, unit, idx);
                Value::Duration(TimeDelta::nanoseconds(to_nanos(raw, unit)))
            }
            DataType::List(item) => {
                let values = array.as_list::<i32>().value(idx);
                Value::List(list_values(registry, item, values.as_ref())?)
            }
            DataType::LargeList(item) => {
                let values = array.as_list::<i64>().value(idx);
                Value::List(list_values(registry, item, values.as_ref())?)
            }
            DataType::Struct(fields) => {
                let structs = array.as_struct();
                let mut record = IndexMap::with_capacity(fields.len());
                for (child_field, child) in fields.iter().zip(structs.columns()) {
                    let value = Value::from_field(registry, child_field, child.as_ref(), idx)?;
                    record.insert(child_field.name().clone(), value);
                }
                Value::Record(record)
            }
            other => {
                warn!(data_type = ?other, "Unsupported Arrow type, converting to string");
                Value::String(array_value_to_string(array, idx)?)
            }
        };

        Ok(value)
    }
}

fn list_values(registry: &ExtensionRegistry, item: &Field, values: &dyn Array) -> Result<Vec<Value>> {
    let extension = registry.resolve(item)?;
    (0..values.len())
        .map(|i| Value::from_array(registry, extension.as_ref(), values, i))
        .collect()
}

fn timestamp_value(array: &dyn Array, unit: &TimeUnit, idx: usize) -> i64 {
    match unit {
        TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value(idx),
        TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value(idx),
        TimeUnit::Microsecond => array.as_primitive::<TimestampMicrosecondType>().value(idx),
        TimeUnit::Nanosecond => array.as_primitive::<TimestampNanosecondType>().value(idx),
    }
}

fn duration_value(array: &dyn Array, unit: &TimeUnit, idx: usize) -> i64 {
    match unit {
        TimeUnit::Second => array.as_primitive::<DurationSecondType>().value(idx),
        TimeUnit::Millisecond => array.as_primitive::<DurationMillisecondType>().value(idx),
        TimeUnit::Microsecond => array.as_primitive::<DurationMicrosecondType>().value(idx),
        TimeUnit::Nanosecond => array.as_primitive::<DurationNanosecondType>().value(idx),
    }
}

fn to_nanos(raw: i64, unit: &TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000_000),
        TimeUnit::Microsecond => raw.saturating_mul(1_000),
        TimeUnit::Nanosecond => raw,
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<IpAddr> for Value {
    fn from(value: IpAddr) -> Self {
        Value::Ip(value)
    }
}

impl From<IpNetwork> for Value {
    fn from(value: IpNetwork) -> Self {
        Value::Subnet(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
