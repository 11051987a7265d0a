//! The data reader capability shared by every row source.
//!
//! A writer only needs ordinal, name and declared type per column plus
//! positional access to the current row; it does not care whether rows come
//! from a parsed file or from memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagnostics::CancellationToken;
use crate::error::{ReaderError, ReaderResult};
use crate::model::{DataType, TypedValue};

pub mod encoding;

pub use encoding::{decode_auto, decode_content, detect_encoding};

/// One column of a source schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumn {
    pub ordinal: usize,
    pub name: String,
    pub data_type: DataType,
}

impl SourceColumn {
    pub fn new(ordinal: usize, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            ordinal,
            name: name.into(),
            data_type,
        }
    }
}

/// Forward-only row source.
#[async_trait]
pub trait DataReader: Send {
    /// Resolve the schema; sources that know it up front need nothing.
    async fn prepare(&mut self) -> ReaderResult<()> {
        Ok(())
    }

    fn schema(&self) -> &[SourceColumn];

    /// Advance to the next row; `false` at the end.
    async fn read(&mut self, cancel: &CancellationToken) -> ReaderResult<bool>;

    /// Value of the current row at `ordinal`.
    fn value(&self, ordinal: usize) -> Option<&TypedValue>;

    /// 1-based number of the current row.
    fn record_number(&self) -> u64;
}

/// Rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataReader {
    schema: Vec<SourceColumn>,
    rows: Vec<Vec<TypedValue>>,
    position: usize,
}

impl InMemoryDataReader {
    pub fn new(schema: Vec<SourceColumn>, rows: Vec<Vec<TypedValue>>) -> Self {
        Self {
            schema,
            rows,
            position: 0,
        }
    }

    /// Text columns named `names`, rows given as strings.
    pub fn from_strings(names: &[&str], rows: &[&[&str]]) -> Self {
        let schema = names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| SourceColumn::new(ordinal, *name, DataType::String))
            .collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| TypedValue::from(*v)).collect())
            .collect();
        Self::new(schema, rows)
    }
}

#[async_trait]
impl DataReader for InMemoryDataReader {
    fn schema(&self) -> &[SourceColumn] {
        &self.schema
    }

    async fn read(&mut self, cancel: &CancellationToken) -> ReaderResult<bool> {
        if cancel.is_cancelled() {
            return Err(ReaderError::Cancelled {
                records: self.position as u64,
            });
        }
        if self.position >= self.rows.len() {
            return Ok(false);
        }
        self.position += 1;
        Ok(true)
    }

    fn value(&self, ordinal: usize) -> Option<&TypedValue> {
        self.position
            .checked_sub(1)
            .and_then(|row| self.rows.get(row))
            .and_then(|row| row.get(ordinal))
    }

    fn record_number(&self) -> u64 {
        self.position as u64
    }
}
