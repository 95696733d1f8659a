//! Point sampling over decoded Irap surfaces.
//!
//! Evaluates a surface at arbitrary positions with bilinear interpolation,
//! honoring grid rotation. Positions outside the grid, and positions whose
//! enclosing cell touches an undefined node, evaluate to the Irap undefined
//! sentinel instead of NaN so sampled rows can go straight into JSON.

pub mod sample;

pub use irap_parser::{Surface, UNDEF, UNDEF_LIMIT};
pub use sample::{sample_point, sample_points};
