use std::ops::Range;

use crate::error::{Error, Result};
use crate::protocol::field::{Field, SqlType};
use crate::protocol::value::Value;

/// Read access to the cells of a decoded row.
///
/// A NULL cell (`None`) is distinct from an empty one (`Some(&[])`).
pub trait RowView {
    /// Number of cells, equal to the number of fields
    fn len(&self) -> usize;

    /// Raw cell bytes; `None` for NULL or an index past the last column
    fn get(&self, index: usize) -> Option<&[u8]>;

    /// Whether the cells use the binary protocol encoding
    fn is_binary_encoded(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_null(&self, index: usize) -> bool {
        index < self.len() && self.get(index).is_none()
    }

    /// Decode one cell against its field
    fn value(&self, fields: &[Field], index: usize) -> Result<Value<'_>> {
        let field = fields.get(index).ok_or_else(|| {
            Error::ResourceMisuse(format!(
                "column index {} out of range for {} columns",
                index,
                fields.len()
            ))
        })?;
        match self.get(index) {
            None => Ok(Value::Null),
            Some(cell) if self.is_binary_encoded() => Value::decode_binary(field, cell),
            Some(cell) => Value::decode_text(field, cell),
        }
    }
}

/// A row holding its own copy of every cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRow {
    cells: Vec<Option<Vec<u8>>>,
    binary: bool,
}

impl OwnedRow {
    pub fn new(cells: Vec<Option<Vec<u8>>>, binary: bool) -> Self {
        Self { cells, binary }
    }

    pub fn cells(&self) -> &[Option<Vec<u8>>] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Option<Vec<u8>>> {
        self.cells
    }
}

impl RowView for OwnedRow {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        self.cells.get(index)?.as_deref()
    }

    fn is_binary_encoded(&self) -> bool {
        self.binary
    }
}

/// A row whose cells point into the connection's reusable packet buffer.
///
/// It borrows the connection, so it is gone before the next row is read.
/// Keep a row with [`BorrowedRow::to_owned_row`].
#[derive(Debug, Clone)]
pub struct BorrowedRow<'buf> {
    buffer: &'buf [u8],
    cells: Vec<Option<Range<usize>>>,
    binary: bool,
}

impl<'buf> BorrowedRow<'buf> {
    pub(crate) fn new(buffer: &'buf [u8], cells: Vec<Option<Range<usize>>>, binary: bool) -> Self {
        Self {
            buffer,
            cells,
            binary,
        }
    }

    pub fn to_owned_row(&self) -> OwnedRow {
        let cells = self
            .cells
            .iter()
            .map(|cell| cell.as_ref().map(|range| self.buffer[range.clone()].to_vec()))
            .collect();
        OwnedRow::new(cells, self.binary)
    }
}

impl RowView for BorrowedRow<'_> {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        let range = self.cells.get(index)?.clone()?;
        self.buffer.get(range)
    }

    fn is_binary_encoded(&self) -> bool {
        self.binary
    }
}

/// Row returned by the decoder
#[derive(Debug, Clone)]
pub enum DecodedRow<'buf> {
    Owned(OwnedRow),
    Borrowed(BorrowedRow<'buf>),
}

impl DecodedRow<'_> {
    /// Copy the row out of the packet buffer if needed
    pub fn to_owned_row(&self) -> OwnedRow {
        match self {
            DecodedRow::Owned(row) => row.clone(),
            DecodedRow::Borrowed(row) => row.to_owned_row(),
        }
    }

    pub fn into_owned_row(self) -> OwnedRow {
        match self {
            DecodedRow::Owned(row) => row,
            DecodedRow::Borrowed(row) => row.to_owned_row(),
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, DecodedRow::Borrowed(_))
    }
}

impl RowView for DecodedRow<'_> {
    fn len(&self) -> usize {
        match self {
            DecodedRow::Owned(row) => row.len(),
            DecodedRow::Borrowed(row) => row.len(),
        }
    }

    fn get(&self, index: usize) -> Option<&[u8]> {
        match self {
            DecodedRow::Owned(row) => row.get(index),
            DecodedRow::Borrowed(row) => row.get(index),
        }
    }

    fn is_binary_encoded(&self) -> bool {
        match self {
            DecodedRow::Owned(row) => row.is_binary_encoded(),
            DecodedRow::Borrowed(row) => row.is_binary_encoded(),
        }
    }
}

/// Whether rows of these fields must be read as a whole packet.
///
/// Large-object columns never take the streaming fast path.
pub fn force_buffer_row(fields: &[Field]) -> bool {
    fields.iter().any(|field| {
        field.column_type().is_large_object()
            || matches!(
                field.sql_type(),
                SqlType::LongVarChar | SqlType::LongVarBinary
            )
    })
}
