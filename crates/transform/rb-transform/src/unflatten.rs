//! Reassembles leaf columns into a nested record batch.

use crate::flatten::FlattenedColumn;
use crate::path::FieldPath;
use arrow::array::{ArrayRef, StructArray};
use arrow::datatypes::{DataType, Field, FieldRef, Fields, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use indexmap::IndexMap;
use rb_error::{Result, TransformError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A finished leaf column of the output batch.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    /// Path of the leaf.
    pub key: FieldPath,
    pub field: FieldRef,
    pub array: ArrayRef,
    /// Whether `array` is the unmodified input array.
    pub reused: bool,
}

impl OutputColumn {
    /// Wraps an input leaf that passes through untouched.
    pub fn reused(column: &FlattenedColumn) -> Self {
        Self {
            key: column.path.clone(),
            field: Arc::clone(&column.field),
            array: Arc::clone(&column.array),
            reused: true,
        }
    }
}

enum Slot {
    Leaf(OutputColumn),
    Group(IndexMap<String, Slot>),
}

/// Rebuilds the nested output batch.
///
/// `originals` are the flattened input columns. A top-level column whose
/// leaves all come back reused, with none missing and none added, is taken
/// over from `batch` as is. Every other struct is rebuilt from its leaves.
/// Columns keep the order of `columns`, which puts original top-level
/// columns first.
pub fn unflatten(
    batch: &RecordBatch,
    originals: &[FlattenedColumn],
    columns: Vec<OutputColumn>,
) -> Result<Arc<RecordBatch>> {
    let mut original_leaves: HashMap<&str, usize> = HashMap::new();
    for column in originals {
        *original_leaves.entry(column.root()).or_default() += 1;
    }

    let mut reused_leaves: HashMap<String, (usize, bool)> = HashMap::new();
    let mut tree: IndexMap<String, Slot> = IndexMap::new();
    for column in columns {
        let entry = reused_leaves
            .entry(column.key.root().to_string())
            .or_insert((0, true));
        entry.0 += 1;
        entry.1 &= column.reused;
        insert(&mut tree, column)?;
    }

    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = Vec::with_capacity(tree.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(tree.len());
    for (name, slot) in tree {
        let untouched = match reused_leaves.get(&name) {
            Some((count, all_reused)) => {
                *all_reused && original_leaves.get(name.as_str()) == Some(count)
            }
            None => false,
        };
        if untouched {
            if let Ok(idx) = schema.index_of(&name) {
                trace!(column = %name, "Reusing input column");
                fields.push(Arc::clone(&schema.fields()[idx]));
                arrays.push(Arc::clone(batch.column(idx)));
                continue;
            }
        }

        let (field, array) = assemble(&name, slot)?;
        fields.push(field);
        arrays.push(array);
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    let output = RecordBatch::try_new_with_options(Arc::new(schema), arrays, &options)?;
    Ok(Arc::new(output))
}

fn insert(tree: &mut IndexMap<String, Slot>, column: OutputColumn) -> Result<()> {
    let Some((leaf, parents)) = column.key.segments().split_last() else {
        return Err(TransformError::FieldConflict(column.key.to_string()).into());
    };
    let leaf = leaf.clone();

    let mut level = tree;
    let mut prefix = FieldPath::row();
    for segment in parents {
        prefix = prefix.child(segment.as_str());
        let slot = level
            .entry(segment.clone())
            .or_insert_with(|| Slot::Group(IndexMap::new()));
        level = match slot {
            Slot::Group(children) => children,
            Slot::Leaf(_) => {
                return Err(TransformError::FieldConflict(prefix.to_string()).into())
            }
        };
    }

    if level.contains_key(&leaf) {
        return Err(TransformError::FieldConflict(column.key.to_string()).into());
    }
    level.insert(leaf, Slot::Leaf(column));
    Ok(())
}

fn assemble(name: &str, slot: Slot) -> Result<(FieldRef, ArrayRef)> {
    match slot {
        Slot::Leaf(column) => {
            let field = if column.field.name() == name {
                column.field
            } else {
                Arc::new(Field::clone(&column.field).with_name(name))
            };
            Ok((field, column.array))
        }
        Slot::Group(children) => {
            let mut fields = Vec::with_capacity(children.len());
            let mut arrays = Vec::with_capacity(children.len());
            for (child, slot) in children {
                let (field, array) = assemble(&child, slot)?;
                fields.push(field);
                arrays.push(array);
            }
            let fields = Fields::from(fields);
            let array = StructArray::try_new(fields.clone(), arrays, None)?;
            let field = Field::new(name, DataType::Struct(fields), true);
            Ok((Arc::new(field), Arc::new(array)))
        }
    }
}
