//! Struct flattening: nested columns to leaf columns addressed by path.

use crate::path::FieldPath;
use arrow::array::{make_array, Array, ArrayRef, AsArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, FieldRef};
use arrow::record_batch::RecordBatch;
use rb_error::Result;
use rb_extension::{ExtensionRegistry, ExtensionType};
use std::sync::Arc;

/// A leaf column of a batch, addressed by its path.
#[derive(Debug, Clone)]
pub struct FlattenedColumn {
    /// Names from the top-level column down to this leaf.
    pub path: FieldPath,
    /// Leaf field; its name is the last path segment.
    pub field: FieldRef,
    /// Leaf array with the validity of all enclosing structs applied.
    pub array: ArrayRef,
    /// Extension type of the leaf, if any.
    pub extension: Option<ExtensionType>,
}

impl FlattenedColumn {
    /// Name of the top-level column this leaf belongs to.
    pub fn root(&self) -> &str {
        self.path.root()
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self.field.data_type(),
            DataType::List(_) | DataType::LargeList(_)
        )
    }
}

/// Flattens every struct column of `batch` into its leaves.
///
/// Lists, empty structs and extension types are leaves, even when their
/// storage is a struct.
pub fn flatten(batch: &RecordBatch, registry: &ExtensionRegistry) -> Result<Vec<FlattenedColumn>> {
    let schema = batch.schema();
    let mut columns = Vec::with_capacity(schema.fields().len());
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        flatten_column(
            FieldPath::new(field.name().as_str()),
            Arc::clone(field),
            Arc::clone(array),
            registry,
            &mut columns,
        )?;
    }
    Ok(columns)
}

fn flatten_column(
    path: FieldPath,
    field: FieldRef,
    array: ArrayRef,
    registry: &ExtensionRegistry,
    out: &mut Vec<FlattenedColumn>,
) -> Result<()> {
    let extension = registry.resolve(&field)?;
    let children = match field.data_type() {
        DataType::Struct(children) if extension.is_none() && !children.is_empty() => {
            children.clone()
        }
        _ => {
            out.push(FlattenedColumn {
                path,
                field,
                array,
                extension,
            });
            return Ok(());
        }
    };

    let structs = array.as_struct();
    for (child_field, child) in children.iter().zip(structs.columns()) {
        let (child_field, child) = push_down_nulls(structs.nulls(), child_field, child)?;
        flatten_column(
            path.child(child_field.name().as_str()),
            child_field,
            child,
            registry,
            out,
        )?;
    }
    Ok(())
}

/// Merges the parent struct's validity into a child.
///
/// Without nulls on the parent the child is shared untouched.
fn push_down_nulls(
    parent: Option<&NullBuffer>,
    field: &FieldRef,
    child: &ArrayRef,
) -> Result<(FieldRef, ArrayRef)> {
    let Some(parent) = parent.filter(|nulls| nulls.null_count() > 0) else {
        return Ok((Arc::clone(field), Arc::clone(child)));
    };
    if child.data_type() == &DataType::Null {
        return Ok((Arc::clone(field), Arc::clone(child)));
    }

    let field = Arc::new(Field::clone(field).with_nullable(true));
    Ok((field, with_nulls(child, parent)?))
}

/// Returns `array` with `nulls` merged into its own validity.
pub(crate) fn with_nulls(array: &ArrayRef, nulls: &NullBuffer) -> Result<ArrayRef> {
    let merged = NullBuffer::union(Some(nulls), array.nulls());
    let data = array.to_data().into_builder().nulls(merged).build()?;
    Ok(make_array(data))
}
