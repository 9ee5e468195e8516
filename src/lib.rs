//! Rate-distortion optimised construction of coding trees.
//!
//! Every coding tree block of a picture is decided by recursively trying the
//! alternatives at each node (split or not, inter or intra, PCM or predicted) and
//! keeping the one with the lowest `D + lambda * R`.

#[macro_use]
extern crate log;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod com;
pub mod enc;

pub use api::*;
pub use com::picture::Picture;
pub use enc::{default_algo, EncoderContext, PictureStats};
