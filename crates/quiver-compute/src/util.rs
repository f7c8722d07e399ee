use quiver_core::buffer::{Bitmap, BitmapBuilder};
use quiver_core::builder::{array_from_scalars, new_null_array};
use quiver_core::{Array, DataType, Error, Result, Scalar};

/// Row-wise AND of two optional validity bitmaps of length `len`.
pub(crate) fn combine_validity(
    a: Option<&Bitmap>,
    b: Option<&Bitmap>,
    len: usize,
) -> Option<Bitmap> {
    match (a, b) {
        (None, None) => None,
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (Some(x), Some(y)) => {
            let mut builder = BitmapBuilder::with_capacity(len);
            for i in 0..len {
                builder.append(x.get(i) && y.get(i));
            }
            Some(builder.finish())
        }
    }
}

pub(crate) fn check_same_len(left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(Error::InvalidArgument(format!(
            "array lengths differ: {left} vs {right}"
        )));
    }
    Ok(())
}

/// `len` copies of `scalar` as an array of `data_type`.
pub(crate) fn broadcast(scalar: &Scalar, data_type: &DataType, len: usize) -> Result<Array> {
    if scalar.is_null() {
        return new_null_array(data_type, len);
    }
    let value = scalar.cast_to(data_type).or_else(|e| match scalar {
        Scalar::Struct(_) => Ok(scalar.clone()),
        _ => Err(e),
    })?;
    array_from_scalars(data_type, &vec![value; len])
}
