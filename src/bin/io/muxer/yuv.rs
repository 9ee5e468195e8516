use super::{plane_bytes, Muxer};

use std::fs::File;
use std::io;
use std::io::Write;

use ctbtree::Picture;

/// Planar YUV without any header.
pub struct YuvMuxer {
    writer: Box<dyn Write>,
}

impl YuvMuxer {
    pub fn new(path: &str) -> io::Result<Box<dyn Muxer>> {
        let writer: Box<dyn Write> = match path {
            "-" => Box::new(io::stdout()),
            f => Box::new(File::create(f)?),
        };
        Ok(Box::new(YuvMuxer { writer }))
    }
}

impl Muxer for YuvMuxer {
    fn write(&mut self, pic: &Picture) -> io::Result<()> {
        for c in 0..3 {
            self.writer.write_all(&plane_bytes(pic, c))?;
        }
        self.writer.flush()
    }
}
