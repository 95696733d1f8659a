//! Bilinear sampling of a regular surface.

use irap_parser::{Surface, UNDEF, UNDEF_LIMIT};

/// Sample a surface at one position.
///
/// The position is mapped into the grid frame (translated to the origin
/// node, rotation undone) and bilinearly interpolated between the four
/// corners of its enclosing cell. Returns [`UNDEF`] when the position falls
/// outside the grid or any corner of the cell is undefined.
pub fn sample_point(surface: &Surface, x: f64, y: f64) -> f64 {
    let dx = x - surface.xori;
    let dy = y - surface.yori;

    // Undo the grid rotation (rot is anticlockwise, in degrees).
    let (xr, yr) = if surface.rot != 0.0 {
        let rad = surface.rot.to_radians();
        let (sin, cos) = rad.sin_cos();
        (dx * cos + dy * sin, dy * cos - dx * sin)
    } else {
        (dx, dy)
    };

    if !xr.is_finite() || !yr.is_finite() {
        return UNDEF;
    }

    // Edge hits can land a hair outside after the rotation; snap them back.
    let x_extent = (surface.nx - 1) as f64 * surface.xinc;
    let y_extent = (surface.ny - 1) as f64 * surface.yinc;
    let eps_x = surface.xinc * 1e-9;
    let eps_y = surface.yinc * 1e-9;
    if xr < -eps_x || yr < -eps_y || xr > x_extent + eps_x || yr > y_extent + eps_y {
        return UNDEF;
    }
    let xr = xr.clamp(0.0, x_extent);
    let yr = yr.clamp(0.0, y_extent);

    let (i0, xf) = cell_index(xr, surface.xinc, surface.nx);
    let (j0, yf) = cell_index(yr, surface.yinc, surface.ny);
    let i1 = (i0 + 1).min(surface.nx - 1);
    let j1 = (j0 + 1).min(surface.ny - 1);

    let v00 = f64::from(surface.values[j0 * surface.nx + i0]);
    let v10 = f64::from(surface.values[j0 * surface.nx + i1]);
    let v01 = f64::from(surface.values[j1 * surface.nx + i0]);
    let v11 = f64::from(surface.values[j1 * surface.nx + i1]);

    if !defined(v00) || !defined(v10) || !defined(v01) || !defined(v11) {
        return UNDEF;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Sample a surface at each `(x, y)` pair, in input order.
///
/// Callers guarantee equal-length slices; extra entries in the longer slice
/// are ignored.
pub fn sample_points(surface: &Surface, xcoords: &[f64], ycoords: &[f64]) -> Vec<f64> {
    xcoords
        .iter()
        .zip(ycoords)
        .map(|(&x, &y)| sample_point(surface, x, y))
        .collect()
}

fn defined(value: f64) -> bool {
    value.is_finite() && value < UNDEF_LIMIT
}

/// Cell index and fractional offset along one axis. `t` already lies inside
/// `[0, (n - 1) * inc]`; the far edge collapses onto the last cell.
fn cell_index(t: f64, inc: f64, n: usize) -> (usize, f64) {
    let raw = t / inc;
    let mut i = raw as usize;
    if i + 1 >= n {
        i = n.saturating_sub(2);
    }
    (i, raw - i as f64)
}
