//! ResultsBuffer - collects per-row output and turns it back into a batch.

use crate::build::build_array;
use crate::flatten::{flatten, with_nulls, FlattenedColumn};
use crate::infer::infer_column;
use crate::path::FieldPath;
use crate::row::RowView;
use crate::unflatten::{unflatten, OutputColumn};
use crate::value::Value;
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Field, FieldRef};
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use rb_error::{Result, TransformError};
use rb_extension::{ExtensionRegistry, ExtensionType};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Output of one key across the rows finished so far.
#[derive(Debug, Default)]
struct KeyOutput {
    values: Vec<Value>,
    present: Vec<bool>,
    emitted: usize,
    touched: bool,
}

impl KeyOutput {
    fn push(&mut self, row: usize, value: Value, touched: bool) {
        self.pad(row);
        self.values.push(value);
        self.present.push(true);
        self.emitted += 1;
        self.touched |= touched;
    }

    fn pad(&mut self, len: usize) {
        self.values.resize(len, Value::Null);
        self.present.resize(len, false);
    }
}

/// Accumulates the rows of one batch.
///
/// Rows are projected with [`ResultsBuffer::start_row`], handed to the
/// script and given back through [`ResultsBuffer::finish_row`] in index
/// order. [`ResultsBuffer::finish`] then builds the output batch, reusing
/// every input column nobody changed.
pub struct ResultsBuffer<'a> {
    registry: &'a ExtensionRegistry,
    batch: Arc<RecordBatch>,
    columns: Vec<FlattenedColumn>,
    outputs: IndexMap<FieldPath, KeyOutput>,
    finished: usize,
}

impl<'a> ResultsBuffer<'a> {
    /// Flattens `batch` and prepares an empty buffer for its rows.
    pub fn new(batch: Arc<RecordBatch>, registry: &'a ExtensionRegistry) -> Result<Self> {
        let columns = flatten(&batch, registry)?;
        debug!(
            rows = batch.num_rows(),
            leaves = columns.len(),
            "Flattened input batch"
        );
        Ok(Self {
            registry,
            batch,
            columns,
            outputs: IndexMap::new(),
            finished: 0,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Flattened input columns.
    pub fn columns(&self) -> &[FlattenedColumn] {
        &self.columns
    }

    /// Builds the view of row `row`.
    pub fn start_row(&self, row: usize) -> Result<RowView> {
        let mut view = RowView::new(row);
        for column in &self.columns {
            let value = Value::from_array(
                self.registry,
                column.extension.as_ref(),
                column.array.as_ref(),
                row,
            )?;
            view.load(&column.path, value);
        }
        Ok(view)
    }

    /// Records the output of a finished row.
    pub fn finish_row(&mut self, view: RowView) -> Result<()> {
        let emissions = view.emit();
        if emissions.is_empty() {
            return Err(TransformError::EmptyRowOutput { row: view.row() }.into());
        }

        let row = self.finished;
        for emission in emissions {
            self.outputs
                .entry(emission.key)
                .or_default()
                .push(row, emission.value, emission.touched);
        }
        self.finished += 1;
        Ok(())
    }

    /// Builds the output batch.
    pub fn finish(mut self) -> Result<Arc<RecordBatch>> {
        let num_rows = self.batch.num_rows();
        if num_rows == 0 {
            return Ok(self.batch);
        }
        for output in self.outputs.values_mut() {
            output.pad(num_rows);
        }

        let mut columns = Vec::with_capacity(self.outputs.len());
        let mut original_keys = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            original_keys.insert(&column.path);
            let Some(output) = self.outputs.get(&column.path) else {
                debug!(key = %column.path, "Field removed in every row, dropping");
                continue;
            };
            if !output.touched && output.emitted == num_rows {
                columns.push(OutputColumn::reused(column));
            } else if !output.touched {
                columns.push(self.mask_removed(column, output)?);
            } else {
                columns.push(self.rebuild(&column.path, Some(column), output)?);
            }
        }
        for (key, output) in &self.outputs {
            if !original_keys.contains(key) {
                columns.push(self.rebuild(key, None, output)?);
            }
        }

        debug!(
            reused = columns.iter().filter(|c| c.reused).count(),
            rebuilt = columns.iter().filter(|c| !c.reused).count(),
            "Finished output columns"
        );
        unflatten(&self.batch, &self.columns, columns)
    }

    /// Keeps an unchanged input column, nulling the rows that removed it.
    fn mask_removed(&self, column: &FlattenedColumn, output: &KeyOutput) -> Result<OutputColumn> {
        let array = if column.array.data_type() == &DataType::Null {
            Arc::clone(&column.array)
        } else {
            with_nulls(&column.array, &NullBuffer::from(output.present.clone()))?
        };
        Ok(OutputColumn {
            key: column.path.clone(),
            field: Arc::new(Field::clone(&column.field).with_nullable(true)),
            array,
            reused: false,
        })
    }

    fn rebuild(
        &self,
        key: &FieldPath,
        original: Option<&FlattenedColumn>,
        output: &KeyOutput,
    ) -> Result<OutputColumn> {
        let name = key.name();
        let display = key.to_string();
        let field = match original.and_then(|column| enumeration_hint(column, name, &output.values)) {
            Some(field) => field,
            None => Arc::new(infer_column(&display, name, &output.values)?),
        };
        debug!(key = %key, data_type = %field.data_type(), "Rebuilding column");
        let array = build_array(self.registry, &display, &field, &output.values)?;
        Ok(OutputColumn {
            key: key.clone(),
            field,
            array,
            reused: false,
        })
    }
}

/// Keeps an enumeration column an enumeration when every new value is
/// still one of its members.
fn enumeration_hint(column: &FlattenedColumn, name: &str, values: &[Value]) -> Option<FieldRef> {
    let Some(ExtensionType::Enumeration(codec)) = &column.extension else {
        return None;
    };
    let mut any = false;
    for value in values {
        match value {
            Value::Null => {}
            Value::String(member) if codec.is_member(member) => any = true,
            _ => return None,
        }
    }
    if !any {
        return None;
    }
    codec.field(name).ok().map(Arc::new)
}
