//! Irap binary surface codec.
//!
//! Decodes the regular-surface format RMS writes and object stores serve:
//! three Fortran-framed header records followed by the node values as f32,
//! everything big-endian. The decoder accepts any record partitioning of the
//! data section; the encoder writes one record per grid row.

pub mod decode;
pub mod encode;
pub mod error;
pub mod surface;

pub use decode::decode_surface;
pub use encode::encode_surface;
pub use error::{IrapError, IrapResult};
pub use surface::{Surface, UNDEF, UNDEF_LIMIT};
