//! Host value model
//!
//! A `Value` is one datum as the calculation host sees it: a tagged union
//! over the closed set of host-native kinds (string, number, boolean,
//! integer, error code, 2-D array, opaque object reference, byte buffer,
//! the missing/nil markers and the sheet-reference kinds).
//!
//! Values are immutable once constructed. Equality and hashing are
//! structural: arrays compare by nested contents, floats hash by
//! canonicalized bits.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::heap::Handle;

// ============================================================================
// ValueKind
// ============================================================================

/// The kind tag of a host value, used as one side of a type mapping.
///
/// `Any` is the top kind (the host's untyped operand): every concrete kind is
/// assignable to it. All other kinds are assignable only to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Top kind — matches any concrete kind
    Any,
    /// String
    Str,
    /// 64-bit floating point number
    Num,
    /// Boolean
    Bool,
    /// 32-bit integer
    Int,
    /// Calculation error code
    Err,
    /// 2-D grid of values
    Array,
    /// Opaque object reference (heap handle)
    Object,
    /// Large byte buffer
    BigData,
    /// Argument omitted by the caller
    Missing,
    /// Empty cell
    Nil,
    /// Range reference on the calling sheet
    LocalRef,
    /// Range reference spanning an explicit sheet
    MultiRef,
    /// Sheet identifier
    SheetId,
}

impl ValueKind {
    /// Whether a value of kind `other` is acceptable where `self` is declared.
    #[inline]
    pub fn is_assignable_from(self, other: ValueKind) -> bool {
        self == ValueKind::Any || self == other
    }
}

// ============================================================================
// HostError
// ============================================================================

/// Calculation error codes understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostError {
    /// #NULL!
    Null,
    /// #DIV/0!
    Div0,
    /// #VALUE!
    Value,
    /// #REF!
    Ref,
    /// #NAME?
    Name,
    /// #NUM!
    Num,
    /// #N/A
    Na,
}

impl HostError {
    /// Numeric code used on the wire by the host transport.
    pub fn code(self) -> u16 {
        match self {
            HostError::Null => 0,
            HostError::Div0 => 7,
            HostError::Value => 15,
            HostError::Ref => 23,
            HostError::Name => 29,
            HostError::Num => 36,
            HostError::Na => 42,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostError::Null => "#NULL!",
            HostError::Div0 => "#DIV/0!",
            HostError::Value => "#VALUE!",
            HostError::Ref => "#REF!",
            HostError::Name => "#NAME?",
            HostError::Num => "#NUM!",
            HostError::Na => "#N/A",
        };
        f.write_str(s)
    }
}

// ============================================================================
// References
// ============================================================================

/// Identifier of one sheet in the host workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetId(pub u32);

/// Rectangular cell range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// First row
    pub first_row: u32,
    /// Last row
    pub last_row: u32,
    /// First column
    pub first_col: u32,
    /// Last column
    pub last_col: u32,
}

// ============================================================================
// HostObject
// ============================================================================

/// An opaque reference to a native object held in the heap.
///
/// This is a reference, not ownership: the heap owns the native value, the
/// host holds the handle across calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostObject {
    /// Declared native type name, for display on the host side
    pub type_name: String,
    /// Heap handle resolving to the native value
    pub handle: Handle,
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_name, self.handle)
    }
}

// ============================================================================
// Grid
// ============================================================================

/// Rectangular 2-D grid of values, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cols: usize,
    cells: Vec<Value>,
}

impl Grid {
    /// Create a grid from rows. Ragged rows are padded with `Nil` to the
    /// widest row so the grid is always rectangular.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for mut row in rows {
            let len = row.len();
            cells.append(&mut row);
            for _ in len..cols {
                cells.push(Value::Nil);
            }
        }
        Grid { cols, cells }
    }

    /// Create a single-row grid.
    pub fn row(cells: Vec<Value>) -> Self {
        Grid {
            cols: cells.len(),
            cells,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.cells.len() / self.cols
        }
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cell at `(row, col)`, if in bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        if col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

impl Hash for Grid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cols.hash(state);
        for cell in &self.cells {
            cell.hash(state);
        }
    }
}

// ============================================================================
// Value
// ============================================================================

/// One host-native datum.
///
/// Every conversion in the engine targets this closed union. `Object`
/// carries a heap handle plus the declared native type name — holding a
/// `Value::Object` does not keep the native value alive by itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String
    Str(String),
    /// 64-bit float
    Num(f64),
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// Calculation error
    Err(HostError),
    /// 2-D grid
    Array(Grid),
    /// Opaque object reference
    Object(HostObject),
    /// Large byte buffer
    BigData(Vec<u8>),
    /// Argument omitted by the caller
    Missing,
    /// Empty cell
    Nil,
    /// Range reference on the calling sheet
    LocalRef(CellRange),
    /// Range reference spanning an explicit sheet
    MultiRef {
        /// Sheet the ranges live on
        sheet: SheetId,
        /// Referenced ranges
        ranges: Vec<CellRange>,
    },
    /// Sheet identifier
    Sheet(SheetId),
}

impl Value {
    /// The concrete kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Num(_) => ValueKind::Num,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Err(_) => ValueKind::Err,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::BigData(_) => ValueKind::BigData,
            Value::Missing => ValueKind::Missing,
            Value::Nil => ValueKind::Nil,
            Value::LocalRef(_) => ValueKind::LocalRef,
            Value::MultiRef { .. } => ValueKind::MultiRef,
            Value::Sheet(_) => ValueKind::SheetId,
        }
    }

    /// Create a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Create a number value.
    pub fn num(n: f64) -> Self {
        Value::Num(n)
    }

    /// The canonical "null/error" value the dispatch boundary returns when a
    /// call cannot produce a result.
    pub fn error() -> Self {
        Value::Err(HostError::Null)
    }

    /// Whether this is the missing-argument marker.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Whether this is the empty-cell marker.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Str(s) => s.hash(state),
            // Canonicalize so that -0.0 and 0.0 (which compare equal)
            // hash identically.
            Value::Num(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                n.to_bits().hash(state);
            }
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Err(e) => e.hash(state),
            Value::Array(g) => g.hash(state),
            Value::Object(o) => o.hash(state),
            Value::BigData(b) => b.hash(state),
            Value::Missing | Value::Nil => {}
            Value::LocalRef(r) => r.hash(state),
            Value::MultiRef { sheet, ranges } => {
                sheet.hash(state);
                ranges.hash(state);
            }
            Value::Sheet(s) => s.hash(state),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
