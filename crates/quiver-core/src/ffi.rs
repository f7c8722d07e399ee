//! Foreign array interchange.
//!
//! `export_array` describes an array in the C data layout (format string,
//! length, null count, offset, buffer addresses, children) and hands out
//! a `ForeignArray` that keeps the array's buffers alive until it is
//! released. The release capability runs exactly once: an explicit
//! `release()`, or drop of an unreleased export, whichever comes first.
//!
//! `import_array` takes ownership of an export without copying. The
//! returned `ImportedArray` views the producer's buffers and releases the
//! export when dropped.
//!
//! Buffer addresses are published for consumers that need them; nothing in
//! this module dereferences them.

use std::fmt;
use std::ops::Deref;

use crate::array::Array;
use crate::buffer::Bitmap;
use crate::error::{Error, Result};

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Exported array in the C data layout.
///
/// Buffer order follows the C data interface: validity first (address 0
/// when absent), then values (primitive and boolean), or offsets and bytes
/// (utf8). Struct arrays carry only validity and describe their fields as
/// children. `offset` applies to every buffer of this array.
pub struct ForeignArray {
    pub length: i64,
    pub null_count: i64,
    pub offset: i64,
    pub format: &'static str,
    pub n_buffers: usize,
    pub buffers: Vec<usize>,
    pub children: Vec<ForeignArray>,
    private_data: Option<Array>,
    // Validity copied to line up with `offset` when the array's own bitmap
    // sits at a different bit offset than its values.
    aligned_validity: Option<Bitmap>,
    release: Option<ReleaseFn>,
}

/// Describe `array` for a foreign consumer. `on_release` runs once when the
/// export is released.
pub fn export_array<F>(array: Array, on_release: F) -> ForeignArray
where
    F: FnOnce() + Send + 'static,
{
    let mut exported = describe(array);
    exported.release = Some(Box::new(on_release));
    exported
}

fn describe(array: Array) -> ForeignArray {
    let validity = array.validity();
    let (offset, mut buffers, children) = match &array {
        Array::Boolean(a) => (a.values().offset(), vec![a.values().address()], vec![]),
        Array::Int16(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::Int32(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::Int64(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::UInt64(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::Float32(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::Float64(a) => (a.values_buffer().offset(), vec![a.values_buffer().base_address()], vec![]),
        Array::Utf8(a) => (
            a.offsets().offset(),
            vec![a.offsets().base_address(), a.data().base_address()],
            vec![],
        ),
        Array::Struct(a) => (
            a.validity().map_or(0, Bitmap::offset),
            vec![],
            a.children().iter().cloned().map(describe).collect(),
        ),
    };
    let aligned_validity = validity
        .filter(|v| v.offset() != offset)
        .map(|v| v.realigned(offset));
    let validity_address = aligned_validity
        .as_ref()
        .or(validity)
        .map_or(0, Bitmap::address);
    buffers.insert(0, validity_address);

    ForeignArray {
        length: array.len() as i64,
        null_count: array.null_count() as i64,
        offset: offset as i64,
        format: array.data_type().format(),
        n_buffers: buffers.len(),
        buffers,
        children,
        private_data: Some(array),
        aligned_validity,
        release: None,
    }
}

impl ForeignArray {
    pub fn is_released(&self) -> bool {
        self.private_data.is_none()
    }

    /// The bitmap `buffers[0]` points at, read from bit `offset`.
    pub fn validity(&self) -> Option<&Bitmap> {
        self.aligned_validity
            .as_ref()
            .or_else(|| self.private_data.as_ref().and_then(Array::validity))
    }

    /// Release the export: children first, then the producer's buffers, then
    /// the producer's callback. Fails on a second call.
    pub fn release(&mut self) -> Result<()> {
        if self.is_released() {
            return Err(Error::InvalidState("foreign array already released".into()));
        }
        for child in &mut self.children {
            if !child.is_released() {
                child.release()?;
            }
        }
        self.private_data = None;
        self.aligned_validity = None;
        if let Some(callback) = self.release.take() {
            callback();
        }
        Ok(())
    }

    fn check_layout(&self, array: &Array) -> Result<()> {
        if self.length != array.len() as i64
            || self.null_count != array.null_count() as i64
            || self.format != array.data_type().format()
            || self.n_buffers != self.buffers.len()
        {
            return Err(Error::Invariant(format!(
                "foreign array header (format {}, length {}) does not describe its data",
                self.format, self.length
            )));
        }
        Ok(())
    }
}

impl Drop for ForeignArray {
    fn drop(&mut self) {
        if !self.is_released() {
            // A parent that was already released has released its children.
            let _ = self.release();
        }
    }
}

impl fmt::Debug for ForeignArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignArray")
            .field("format", &self.format)
            .field("length", &self.length)
            .field("null_count", &self.null_count)
            .field("offset", &self.offset)
            .field("n_buffers", &self.n_buffers)
            .field("children", &self.children.len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// An imported array. Dropping it releases the underlying export.
#[derive(Debug)]
pub struct ImportedArray {
    array: Array,
    foreign: ForeignArray,
}

/// Take ownership of `foreign` without copying its buffers.
pub fn import_array(foreign: ForeignArray) -> Result<ImportedArray> {
    let array = match &foreign.private_data {
        Some(array) => array.clone(),
        None => return Err(Error::InvalidState("cannot import a released foreign array".into())),
    };
    foreign.check_layout(&array)?;
    Ok(ImportedArray { array, foreign })
}

impl ImportedArray {
    pub fn array(&self) -> &Array {
        &self.array
    }

    /// Release now instead of at drop.
    pub fn release(mut self) -> Result<()> {
        self.foreign.release()
    }
}

impl Deref for ImportedArray {
    type Target = Array;
    fn deref(&self) -> &Array {
        &self.array
    }
}
