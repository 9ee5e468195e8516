use std::io;

use ctbtree::api::Rational;
use ctbtree::Picture;

mod y4m;
use self::y4m::Y4mDemuxer;

/// Stream parameters known from the container header.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    pub bit_depth: usize,
    pub time_base: Rational,
}

pub trait Demuxer {
    fn info(&self) -> VideoInfo;

    /// Next picture, `None` at the end of the stream.
    fn read(&mut self) -> io::Result<Option<Picture>>;
}

pub fn new(filename: &str) -> io::Result<Box<dyn Demuxer>> {
    Y4mDemuxer::new(filename)
}
