//! Type inference for changed and new columns.

use crate::value::Value;
use arrow::datatypes::{DataType, Field, Fields, TimeUnit};
use rb_error::{Result, TransformError};
use rb_extension::{IpCodec, SubnetCodec};
use std::sync::Arc;

/// Infers the field of a column from all of its values.
///
/// The first non-null value decides the type. List item types are taken
/// from the first non-null element across every list of the column, so an
/// empty list in the first row does not pin the item type to null.
pub fn infer_column(key: &str, name: &str, values: &[Value]) -> Result<Field> {
    let example = values
        .iter()
        .find(|value| !value.is_null())
        .ok_or_else(|| TransformError::UnresolvableType {
            key: key.to_string(),
        })?;

    if let Value::List(_) = example {
        let items: Vec<&Value> = values
            .iter()
            .filter_map(|value| match value {
                Value::List(items) => Some(items),
                _ => None,
            })
            .flatten()
            .collect();
        let item = infer_item(key, items.into_iter().find(|item| !item.is_null()))?;
        return Ok(Field::new(name, DataType::List(Arc::new(item)), true));
    }

    infer_field(key, name, example)
}

/// Infers the field of a single example value.
pub fn infer_field(key: &str, name: &str, value: &Value) -> Result<Field> {
    let data_type = match value {
        Value::Ip(_) => return Ok(IpCodec::field(name)),
        Value::Subnet(_) => return Ok(SubnetCodec::field(name)),
        Value::String(_) => DataType::Utf8,
        Value::Bool(_) => DataType::Boolean,
        Value::Int(_) => DataType::Int64,
        Value::UInt(_) => DataType::UInt64,
        Value::Float(_) => DataType::Float64,
        Value::Time(_) => DataType::Timestamp(TimeUnit::Nanosecond, None),
        Value::Duration(_) => DataType::Duration(TimeUnit::Nanosecond),
        Value::Null => DataType::Null,
        Value::Blob(_) => DataType::Binary,
        Value::Record(fields) => {
            let children = fields
                .iter()
                .map(|(child, value)| infer_field(&format!("{key}.{child}"), child, value))
                .collect::<Result<Vec<_>>>()?;
            DataType::Struct(Fields::from(children))
        }
        Value::List(items) => {
            let item = infer_item(key, items.iter().find(|item| !item.is_null()))?;
            DataType::List(Arc::new(item))
        }
    };
    Ok(Field::new(name, data_type, true))
}

fn infer_item(key: &str, example: Option<&Value>) -> Result<Field> {
    match example {
        None => Ok(Field::new("item", DataType::Null, true)),
        Some(Value::Record(_)) => Err(TransformError::Unsupported {
            key: key.to_string(),
            reason: "lists of records cannot be written back".to_string(),
        }
        .into()),
        Some(item) => infer_field(key, "item", item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use rb_error::RbError;
    use rb_extension::ExtensionRegistry;

    #[test]
    fn test_first_non_null_decides() {
        let values = vec![Value::Null, Value::Null, Value::Int(42)];
        let field = infer_column("x", "x", &values).unwrap();
        assert_eq!(field.data_type(), &DataType::Int64);
        assert!(field.is_nullable());
    }

    #[test]
    fn test_all_null_is_unresolvable() {
        let result = infer_column("a.b", "b", &[Value::Null, Value::Null]);
        assert!(matches!(
            result,
            Err(RbError::Transform(TransformError::UnresolvableType { key })) if key == "a.b"
        ));
    }

    #[test]
    fn test_scalar_types() {
        let cases = [
            (Value::from("s"), DataType::Utf8),
            (Value::Bool(true), DataType::Boolean),
            (Value::UInt(1), DataType::UInt64),
            (Value::Float(1.5), DataType::Float64),
            (Value::Blob(vec![1]), DataType::Binary),
            (
                Value::Duration(chrono::TimeDelta::seconds(1)),
                DataType::Duration(TimeUnit::Nanosecond),
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(infer_field("k", "k", &value).unwrap().data_type(), &expected);
        }
    }

    #[test]
    fn test_extension_fields() {
        let registry = ExtensionRegistry::new();
        let ip = infer_field("src", "src", &Value::Ip("10.0.0.1".parse().unwrap())).unwrap();
        assert_eq!(
            registry.resolve(&ip).unwrap().map(|t| t.name()),
            Some(rb_extension::IP_EXTENSION_NAME)
        );

        let net = infer_field("net", "net", &Value::Subnet("10.0.0.0/8".parse().unwrap())).unwrap();
        assert_eq!(net.data_type(), &SubnetCodec::storage_type());
    }

    #[test]
    fn test_list_item_from_later_rows() {
        let values = vec![
            Value::List(vec![]),
            Value::Null,
            Value::List(vec![Value::Null, Value::from("a")]),
        ];
        let field = infer_column("tags", "tags", &values).unwrap();
        let DataType::List(item) = field.data_type() else {
            panic!("expected a list");
        };
        assert_eq!(item.data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_list_of_records_is_unsupported() {
        let record = Value::Record(IndexMap::from([("a".to_string(), Value::Int(1))]));
        let result = infer_column("xs", "xs", &[Value::List(vec![record])]);
        assert!(matches!(
            result,
            Err(RbError::Transform(TransformError::Unsupported { .. }))
        ));
    }

    #[test]
    fn test_record_infers_struct() {
        let record = Value::Record(IndexMap::from([
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::from("x")),
        ]));
        let field = infer_field("r", "r", &record).unwrap();
        let DataType::Struct(children) = field.data_type() else {
            panic!("expected a struct");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].data_type(), &DataType::Utf8);
    }
}
