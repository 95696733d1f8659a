//! Irap binary decoding.
//!
//! Layout, all values big-endian, every record framed by a leading and a
//! trailing i32 byte count:
//!
//! ```text
//! Record 1 (32 bytes): magic (-996) | ny  | xori | xmax | yori | ymax | xinc | yinc
//! Record 2 (16 bytes): nx           | rot | xrot | yrot
//! Record 3 (28 bytes): seven reserved i32 values
//! Data records:        nx * ny node values as f32, any partitioning
//! ```
//!
//! `xmax`/`ymax` are redundant with the origin and increments and are read
//! but ignored, as are the rotation origin fields in record 2.

use tracing::debug;

use crate::error::{IrapError, IrapResult};
use crate::surface::Surface;

/// Magic value in the first header record.
pub(crate) const MAGIC: i32 = -996;

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &'static str) -> IrapResult<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(IrapError::Truncated {
                context,
                needed: n - remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_i32(&mut self, context: &'static str) -> IrapResult<i32> {
        let b = self.take(4, context)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self, context: &'static str) -> IrapResult<f32> {
        let b = self.take(4, context)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

fn expect_marker(cur: &mut Cursor<'_>, expected: i32, context: &'static str) -> IrapResult<()> {
    let got = cur.read_i32(context)?;
    if got != expected {
        return Err(IrapError::RecordMismatch {
            context,
            expected,
            got,
        });
    }
    Ok(())
}

/// Decode an Irap binary blob into a [`Surface`].
pub fn decode_surface(data: &[u8]) -> IrapResult<Surface> {
    let mut cur = Cursor::new(data);

    // Record 1: magic, ny, extent and increments.
    expect_marker(&mut cur, 32, "record 1 start")?;
    let magic = cur.read_i32("magic")?;
    if magic != MAGIC {
        return Err(IrapError::BadMagic(magic));
    }
    let ny = cur.read_i32("ny")?;
    let xori = cur.read_f32("xori")?;
    let _xmax = cur.read_f32("xmax")?;
    let yori = cur.read_f32("yori")?;
    let _ymax = cur.read_f32("ymax")?;
    let xinc = cur.read_f32("xinc")?;
    let yinc = cur.read_f32("yinc")?;
    expect_marker(&mut cur, 32, "record 1 end")?;

    // Record 2: nx and rotation.
    expect_marker(&mut cur, 16, "record 2 start")?;
    let nx = cur.read_i32("nx")?;
    let rot = cur.read_f32("rot")?;
    let _xrot = cur.read_f32("xrot")?;
    let _yrot = cur.read_f32("yrot")?;
    expect_marker(&mut cur, 16, "record 2 end")?;

    // Record 3: reserved.
    expect_marker(&mut cur, 28, "record 3 start")?;
    for _ in 0..7 {
        cur.read_i32("reserved field")?;
    }
    expect_marker(&mut cur, 28, "record 3 end")?;

    if nx <= 0 || ny <= 0 {
        return Err(IrapError::InvalidDimensions { nx, ny });
    }
    if xinc <= 0.0 || yinc <= 0.0 {
        return Err(IrapError::InvalidIncrements { xinc, yinc });
    }
    let expected = nx as usize * ny as usize;

    // A header cannot claim more values than the remaining input could
    // hold; reject the claim before sizing a buffer for it.
    let available = cur.remaining() / 4;
    if expected > available {
        return Err(IrapError::NodeCountMismatch {
            expected,
            got: available,
        });
    }

    // Data records. Writers differ in how many values go into each record,
    // so only the framing and the total count are enforced.
    let mut values: Vec<f32> = Vec::with_capacity(expected);
    while values.len() < expected {
        if cur.is_empty() {
            return Err(IrapError::NodeCountMismatch {
                expected,
                got: values.len(),
            });
        }
        let nbytes = cur.read_i32("data record start")?;
        if nbytes <= 0 || nbytes % 4 != 0 {
            return Err(IrapError::BadDataRecord(nbytes));
        }
        let count = nbytes as usize / 4;
        if values.len() + count > expected {
            return Err(IrapError::NodeCountMismatch {
                expected,
                got: values.len() + count,
            });
        }
        for _ in 0..count {
            values.push(cur.read_f32("node value")?);
        }
        expect_marker(&mut cur, nbytes, "data record end")?;
    }

    debug!(nx, ny, rot, "Decoded Irap surface");

    Ok(Surface {
        nx: nx as usize,
        ny: ny as usize,
        xori: f64::from(xori),
        yori: f64::from(yori),
        xinc: f64::from(xinc),
        yinc: f64::from(yinc),
        rot: f64::from(rot),
        values,
    })
}
