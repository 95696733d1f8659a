//! Irap binary encoding.

use crate::decode::MAGIC;
use crate::error::{IrapError, IrapResult};
use crate::surface::Surface;

/// Encode a [`Surface`] as an Irap binary blob.
///
/// The data section is written as one record per grid row, the partitioning
/// RMS itself produces. `xmax`/`ymax` are derived from the origin and
/// increments; the rotation origin is the grid origin.
pub fn encode_surface(surface: &Surface) -> IrapResult<Vec<u8>> {
    let expected = surface.node_count();
    if surface.values.len() != expected {
        return Err(IrapError::NodeCountMismatch {
            expected,
            got: surface.values.len(),
        });
    }
    if surface.nx == 0 || surface.ny == 0 {
        return Err(IrapError::InvalidDimensions {
            nx: surface.nx as i32,
            ny: surface.ny as i32,
        });
    }

    let xmax = surface.xori + (surface.nx - 1) as f64 * surface.xinc;
    let ymax = surface.yori + (surface.ny - 1) as f64 * surface.yinc;

    // Header framing is 3 records (32 + 16 + 28 bytes plus markers); each
    // data row adds its values plus two markers.
    let mut out = Vec::with_capacity(100 + expected * 4 + surface.ny * 8);

    // Record 1
    put_i32(&mut out, 32);
    put_i32(&mut out, MAGIC);
    put_i32(&mut out, surface.ny as i32);
    put_f32(&mut out, surface.xori as f32);
    put_f32(&mut out, xmax as f32);
    put_f32(&mut out, surface.yori as f32);
    put_f32(&mut out, ymax as f32);
    put_f32(&mut out, surface.xinc as f32);
    put_f32(&mut out, surface.yinc as f32);
    put_i32(&mut out, 32);

    // Record 2
    put_i32(&mut out, 16);
    put_i32(&mut out, surface.nx as i32);
    put_f32(&mut out, surface.rot as f32);
    put_f32(&mut out, surface.xori as f32);
    put_f32(&mut out, surface.yori as f32);
    put_i32(&mut out, 16);

    // Record 3
    put_i32(&mut out, 28);
    for _ in 0..7 {
        put_i32(&mut out, 0);
    }
    put_i32(&mut out, 28);

    // Data: one record per row.
    let row_bytes = (surface.nx * 4) as i32;
    for row in surface.values.chunks(surface.nx) {
        put_i32(&mut out, row_bytes);
        for &value in row {
            put_f32(&mut out, value);
        }
        put_i32(&mut out, row_bytes);
    }

    Ok(out)
}

fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_be_bytes());
}
