use super::{plane_bytes, Muxer};
use crate::io::map_y4m_error;

use std::fs::File;
use std::io;
use std::io::Write;

use ctbtree::api::Rational;
use ctbtree::Picture;

pub struct Y4mMuxer {
    writer: Option<Box<dyn Write>>,
    encoder: Option<y4m::Encoder<Box<dyn Write>>>,
    time_base: Rational,
}

impl Y4mMuxer {
    pub fn new(path: &str, time_base: Rational) -> io::Result<Box<dyn Muxer>> {
        let writer: Box<dyn Write> = match path {
            "-" => Box::new(io::stdout()),
            f => Box::new(File::create(f)?),
        };
        Ok(Box::new(Y4mMuxer {
            writer: Some(writer),
            encoder: None,
            time_base,
        }))
    }
}

impl Muxer for Y4mMuxer {
    fn write(&mut self, pic: &Picture) -> io::Result<()> {
        // the header needs the size of the first picture
        if let Some(writer) = self.writer.take() {
            let colorspace = match pic.bit_depth {
                8 => y4m::Colorspace::C420jpeg,
                10 => y4m::Colorspace::C420p10,
                _ => y4m::Colorspace::C420p12,
            };
            let ratio = y4m::Ratio::new(self.time_base.num as usize, self.time_base.den as usize);
            let encoder = y4m::EncoderBuilder::new(pic.width(), pic.height(), ratio)
                .with_colorspace(colorspace)
                .write_header(writer)
                .map_err(map_y4m_error)?;
            self.encoder = Some(encoder);
        }

        let encoder = match &mut self.encoder {
            Some(encoder) => encoder,
            None => return Err(io::Error::new(io::ErrorKind::Other, "y4m header not written")),
        };
        let (y, u, v) = (plane_bytes(pic, 0), plane_bytes(pic, 1), plane_bytes(pic, 2));
        let frame = y4m::Frame::new([&y, &u, &v], None);
        encoder.write_frame(&frame).map_err(map_y4m_error)
    }
}
