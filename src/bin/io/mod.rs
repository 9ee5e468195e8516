use std::io;

pub mod demuxer;
pub mod muxer;

pub(crate) fn map_y4m_error(e: y4m::Error) -> io::Error {
    match e {
        y4m::Error::IoError(e) => e,
        y4m::Error::EOF => io::Error::new(io::ErrorKind::UnexpectedEof, "end of y4m stream"),
        e => io::Error::new(io::ErrorKind::InvalidData, format!("y4m: {:?}", e)),
    }
}
