//! Array builders: a column of values back into an Arrow array.

use crate::value::Value;
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, DurationNanosecondArray, Float64Array, Int64Array,
    ListArray, NullArray, StringArray, StructArray, TimestampNanosecondArray, UInt64Array,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, Field, TimeUnit};
use rb_error::{Result, TransformError};
use rb_extension::{EnumerationCodec, ExtensionRegistry, ExtensionType, IpCodec, SubnetCodec};
use std::sync::Arc;

/// Builds an array of `field`'s type from one value per row.
///
/// Integers widen to floats, and signed and unsigned integers convert into
/// each other when the value fits. Anything else that does not match the
/// field type fails with a type mismatch naming `key`.
pub fn build_array(
    registry: &ExtensionRegistry,
    key: &str,
    field: &Field,
    values: &[Value],
) -> Result<ArrayRef> {
    if let Some(extension) = registry.resolve(field)? {
        return build_extension(key, &extension, values);
    }

    let array: ArrayRef = match field.data_type() {
        DataType::Null => {
            if let Some(value) = values.iter().find(|value| !value.is_null()) {
                return Err(mismatch(key, field.data_type(), value));
            }
            Arc::new(NullArray::new(values.len()))
        }
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Bool(b) => Ok(Some(*b)),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<BooleanArray>>()?,
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i)),
                    Value::UInt(u) => i64::try_from(*u)
                        .map(Some)
                        .map_err(|_| mismatch(key, field.data_type(), value)),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<Int64Array>>()?,
        ),
        DataType::UInt64 => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::UInt(u) => Ok(Some(*u)),
                    Value::Int(i) => u64::try_from(*i)
                        .map(Some)
                        .map_err(|_| mismatch(key, field.data_type(), value)),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<UInt64Array>>()?,
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    Value::UInt(u) => Ok(Some(*u as f64)),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<Float64Array>>()?,
        ),
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::String(s) => Ok(Some(s.as_str())),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<StringArray>>()?,
        ),
        DataType::Binary => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Blob(b) => Ok(Some(b.as_slice())),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<BinaryArray>>()?,
        ),
        DataType::Timestamp(TimeUnit::Nanosecond, tz) => {
            let array = values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Time(t) => t.timestamp_nanos_opt().map(Some).ok_or_else(|| {
                        out_of_range(key, "time does not fit nanosecond precision")
                    }),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<TimestampNanosecondArray>>()?;
            Arc::new(array.with_timezone_opt(tz.clone()))
        }
        DataType::Duration(TimeUnit::Nanosecond) => Arc::new(
            values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Duration(d) => d.num_nanoseconds().map(Some).ok_or_else(|| {
                        out_of_range(key, "duration does not fit nanosecond precision")
                    }),
                    other => Err(mismatch(key, field.data_type(), other)),
                })
                .collect::<Result<DurationNanosecondArray>>()?,
        ),
        DataType::List(item) => build_list(registry, key, field, item, values)?,
        DataType::Struct(children) => {
            let mut columns = Vec::with_capacity(children.len());
            for child in children.iter() {
                let child_values = values
                    .iter()
                    .map(|value| match value {
                        Value::Null => Ok(Value::Null),
                        Value::Record(record) => {
                            Ok(record.get(child.name()).cloned().unwrap_or(Value::Null))
                        }
                        other => Err(mismatch(key, field.data_type(), other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let child_key = format!("{key}.{}", child.name());
                columns.push(build_array(registry, &child_key, child, &child_values)?);
            }
            let nulls = validity(values);
            Arc::new(StructArray::try_new(children.clone(), columns, nulls)?)
        }
        other => {
            return Err(TransformError::Unsupported {
                key: key.to_string(),
                reason: format!("cannot build arrays of type {other}"),
            }
            .into())
        }
    };

    Ok(array)
}

fn build_list(
    registry: &ExtensionRegistry,
    key: &str,
    field: &Field,
    item: &Arc<Field>,
    values: &[Value],
) -> Result<ArrayRef> {
    let mut lengths = Vec::with_capacity(values.len());
    let mut items = Vec::new();
    for value in values {
        match value {
            Value::Null => lengths.push(0),
            Value::List(list) => {
                lengths.push(list.len());
                items.extend(list.iter().cloned());
            }
            other => return Err(mismatch(key, field.data_type(), other)),
        }
    }

    let child = build_array(registry, key, item, &items)?;
    let list = ListArray::try_new(
        Arc::clone(item),
        OffsetBuffer::from_lengths(lengths),
        child,
        validity(values),
    )?;
    Ok(Arc::new(list))
}

fn build_extension(key: &str, extension: &ExtensionType, values: &[Value]) -> Result<ArrayRef> {
    let array: ArrayRef = match extension {
        ExtensionType::Ip => {
            let addresses = values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Ip(address) => Ok(Some(*address)),
                    other => Err(mismatch(key, &IpCodec::storage_type(), other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(IpCodec::pack_array(&addresses)?)
        }
        ExtensionType::Subnet => {
            let networks = values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::Subnet(network) => Ok(Some(*network)),
                    other => Err(mismatch(key, &SubnetCodec::storage_type(), other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(SubnetCodec::pack_array(&networks)?)
        }
        ExtensionType::Enumeration(codec) => {
            let names = values
                .iter()
                .map(|value| match value {
                    Value::Null => Ok(None),
                    Value::String(name) => Ok(Some(name.as_str())),
                    other => Err(mismatch(key, &EnumerationCodec::storage_type(), other)),
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(codec.pack_array(&names)?)
        }
    };
    Ok(array)
}

/// Validity of a column; `None` when no value is null.
fn validity(values: &[Value]) -> Option<NullBuffer> {
    if values.iter().any(Value::is_null) {
        Some(NullBuffer::from(
            values.iter().map(|value| !value.is_null()).collect::<Vec<_>>(),
        ))
    } else {
        None
    }
}

fn mismatch(key: &str, expected: &DataType, found: &Value) -> rb_error::RbError {
    TransformError::TypeMismatch {
        key: key.to_string(),
        expected: expected.to_string(),
        found: found.kind().to_string(),
    }
    .into()
}

fn out_of_range(key: &str, reason: &str) -> rb_error::RbError {
    TransformError::Unsupported {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::infer_column;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Fields, Int64Type};
    use indexmap::IndexMap;
    use rb_error::RbError;

    fn build(values: &[Value]) -> ArrayRef {
        let field = infer_column("k", "k", values).unwrap();
        build_array(&ExtensionRegistry::new(), "k", &field, values).unwrap()
    }

    #[test]
    fn test_nulls_before_first_value() {
        let array = build(&[Value::Null, Value::Null, Value::Int(42)]);
        let ints = array.as_primitive::<Int64Type>();

        assert_eq!(ints.len(), 3);
        assert!(ints.is_null(0));
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), 42);
    }

    #[test]
    fn test_int_widens_to_float() {
        let array = build(&[Value::Float(0.5), Value::Int(2)]);
        let floats = array.as_primitive::<arrow::datatypes::Float64Type>();
        assert_eq!(floats.value(1), 2.0);
    }

    #[test]
    fn test_type_mismatch() {
        let values = [Value::Int(1), Value::from("two")];
        let field = infer_column("k", "k", &values).unwrap();
        let result = build_array(&ExtensionRegistry::new(), "k", &field, &values);

        assert!(matches!(
            result,
            Err(RbError::Transform(TransformError::TypeMismatch { key, found, .. }))
                if key == "k" && found == "string"
        ));
    }

    #[test]
    fn test_list_array() {
        let array = build(&[
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::Null,
            Value::List(vec![]),
        ]);
        let lists = array.as_list::<i32>();

        assert_eq!(lists.len(), 3);
        assert_eq!(lists.value_length(0), 2);
        assert!(lists.is_null(1));
        assert!(lists.is_valid(2));
        assert_eq!(lists.value_length(2), 0);
    }

    #[test]
    fn test_struct_array() {
        let children = Fields::from(vec![Field::new("a", DataType::Int64, true)]);
        let field = Field::new("r", DataType::Struct(children), true);
        let values = [
            Value::Record(IndexMap::from([("a".to_string(), Value::Int(1))])),
            Value::Null,
        ];
        let array = build_array(&ExtensionRegistry::new(), "r", &field, &values).unwrap();
        let structs = array.as_struct();

        assert!(structs.is_null(1));
        assert_eq!(structs.column(0).as_primitive::<Int64Type>().value(0), 1);
    }

    #[test]
    fn test_extension_arrays() {
        let address = "10.1.21.165".parse().unwrap();
        let array = build(&[Value::Ip(address), Value::Null]);
        assert_eq!(
            IpCodec::value(array.as_fixed_size_binary(), 0).unwrap(),
            Some(address)
        );

        let codec = EnumerationCodec::new([("low", 0), ("high", 1)]).unwrap();
        let field = codec.field("level").unwrap();
        let values = [Value::from("high"), Value::Null];
        let array = build_array(&ExtensionRegistry::new(), "level", &field, &values).unwrap();
        let dictionary = array.as_dictionary::<arrow::datatypes::UInt8Type>();
        assert_eq!(EnumerationCodec::value(dictionary, 0).as_deref(), Some("high"));
    }
}
