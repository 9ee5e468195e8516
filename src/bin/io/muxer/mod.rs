use std::io;

use ctbtree::api::Rational;
use ctbtree::Picture;

mod y4m;
mod yuv;
use self::y4m::Y4mMuxer;
use self::yuv::YuvMuxer;

/// Sink for reconstructed pictures.
pub trait Muxer {
    fn write(&mut self, pic: &Picture) -> io::Result<()>;
}

pub fn new(filename: &str, time_base: Rational) -> io::Result<Box<dyn Muxer>> {
    if filename.ends_with(".y4m") {
        Y4mMuxer::new(filename, time_base)
    } else {
        YuvMuxer::new(filename)
    }
}

/// Samples of one plane as little-endian bytes, one byte per sample up to 8 bits.
pub(crate) fn plane_bytes(pic: &Picture, c_idx: usize) -> Vec<u8> {
    let plane = &pic.planes[c_idx];
    let max = (1i32 << pic.bit_depth) - 1;
    let mut out = Vec::with_capacity(plane.width * plane.height * 2);
    for y in 0..plane.height {
        for &v in plane.row(y) {
            let v = (v as i32).max(0).min(max) as u16;
            if pic.bit_depth > 8 {
                out.extend_from_slice(&v.to_le_bytes());
            } else {
                out.push(v as u8);
            }
        }
    }
    out
}
