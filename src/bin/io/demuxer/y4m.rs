use super::{Demuxer, VideoInfo};
use crate::io::map_y4m_error;

use std::fs::File;
use std::io;
use std::io::Read;

use ctbtree::api::Rational;
use ctbtree::com::picture::Plane;
use ctbtree::com::pel;
use ctbtree::Picture;

pub struct Y4mDemuxer {
    reader: y4m::Decoder<Box<dyn Read>>,
    info: VideoInfo,
}

impl Y4mDemuxer {
    pub fn new(path: &str) -> io::Result<Box<dyn Demuxer>> {
        let reader: Box<dyn Read> = match path {
            "-" => Box::new(io::stdin()),
            f => Box::new(File::open(f)?),
        };
        let reader = y4m::Decoder::new(reader).map_err(map_y4m_error)?;

        let bit_depth = match reader.get_colorspace() {
            y4m::Colorspace::C420
            | y4m::Colorspace::C420jpeg
            | y4m::Colorspace::C420paldv
            | y4m::Colorspace::C420mpeg2 => 8,
            y4m::Colorspace::C420p10 => 10,
            y4m::Colorspace::C420p12 => 12,
            cs => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("only 4:2:0 input is supported, got {:?}", cs),
                ))
            }
        };
        let rate = reader.get_framerate();
        let info = VideoInfo {
            width: reader.get_width(),
            height: reader.get_height(),
            bit_depth,
            time_base: Rational::new(rate.num as u64, rate.den as u64),
        };

        Ok(Box::new(Y4mDemuxer { reader, info }))
    }
}

fn copy_plane(plane: &mut Plane<pel>, raw: &[u8], bytes: usize) {
    let width = plane.width;
    for (y, line) in raw.chunks(width * bytes).take(plane.height).enumerate() {
        let row = plane.row_mut(y);
        if bytes == 1 {
            for (dst, &src) in row.iter_mut().zip(line) {
                *dst = src as pel;
            }
        } else {
            for (dst, src) in row.iter_mut().zip(line.chunks(2)) {
                *dst = u16::from_le_bytes([src[0], src[1]]) as pel;
            }
        }
    }
}

impl Demuxer for Y4mDemuxer {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read(&mut self) -> io::Result<Option<Picture>> {
        let info = self.info;
        let bytes = self.reader.get_bytes_per_sample();
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(y4m::Error::EOF) => return Ok(None),
            Err(e) => return Err(map_y4m_error(e)),
        };

        let mut pic = Picture::new(info.width, info.height, info.bit_depth as u8);
        copy_plane(&mut pic.planes[0], frame.get_y_plane(), bytes);
        copy_plane(&mut pic.planes[1], frame.get_u_plane(), bytes);
        copy_plane(&mut pic.planes[2], frame.get_v_plane(), bytes);
        Ok(Some(pic))
    }
}
