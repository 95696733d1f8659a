//! Decoded surface representation.

/// Node value marking an undefined grid node, per the Irap convention.
pub const UNDEF: f64 = 1.0e30;

/// Values at or above this limit count as undefined.
pub const UNDEF_LIMIT: f64 = 0.9999e30;

/// A regular surface decoded from an Irap binary blob.
///
/// The grid is axis-aligned in its own frame: node `(i, j)` sits at
/// `(xori + i * xinc, yori + j * yinc)` before rotation. `rot` turns the
/// whole grid anticlockwise around the origin node.
///
/// Header geometry is f32 on the wire and widened here once; node values
/// stay f32.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Number of columns (X direction).
    pub nx: usize,
    /// Number of rows (Y direction).
    pub ny: usize,
    /// X coordinate of the origin node.
    pub xori: f64,
    /// Y coordinate of the origin node.
    pub yori: f64,
    /// Column spacing, always positive.
    pub xinc: f64,
    /// Row spacing, always positive.
    pub yinc: f64,
    /// Rotation in degrees, anticlockwise around the origin node.
    pub rot: f64,
    /// Node values, row-major with the X index varying fastest.
    pub values: Vec<f32>,
}

impl Surface {
    /// Value at node `(i, j)`, or `None` outside the grid.
    pub fn node(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.nx || j >= self.ny {
            return None;
        }
        Some(self.values[j * self.nx + i])
    }

    /// Whether a node value means "undefined".
    pub fn is_undef(value: f32) -> bool {
        f64::from(value) >= UNDEF_LIMIT
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nx * self.ny
    }
}
