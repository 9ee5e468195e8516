use std::{fmt, io};

use thiserror::Error;

pub mod config;

pub use config::*;

/*****************************************************************************
 * errors surfaced to the encoder driver
 *****************************************************************************/
#[derive(Debug, Error)]
pub enum CtbError {
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error("picture size {0}x{1} does not match the configured {2}x{3}")]
    SizeMismatch(usize, usize, usize, usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub enum SliceType {
    B = 0,
    P = 1,
    I = 2,
}

impl SliceType {
    /// Only intra prediction may be used inside an I slice.
    pub fn is_intra_only(self) -> bool {
        self == SliceType::I
    }
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::SliceType::*;
        match self {
            B => write!(f, "B"),
            P => write!(f, "P"),
            I => write!(f, "I"),
        }
    }
}

impl From<u8> for SliceType {
    fn from(val: u8) -> Self {
        use self::SliceType::*;
        match val {
            0 => B,
            1 => P,
            _ => I,
        }
    }
}

impl Default for SliceType {
    fn default() -> Self {
        SliceType::I
    }
}

#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub enum PredMode {
    Intra = 0,
    Inter = 1,
}

impl fmt::Display for PredMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredMode::Intra => write!(f, "INTRA"),
            PredMode::Inter => write!(f, "INTER"),
        }
    }
}

impl From<u8> for PredMode {
    fn from(val: u8) -> Self {
        if val == 0 {
            PredMode::Intra
        } else {
            PredMode::Inter
        }
    }
}

impl Default for PredMode {
    fn default() -> Self {
        PredMode::Intra
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub enum PartMode {
    PART_2Nx2N = 0,
    PART_2NxN = 1,
    PART_Nx2N = 2,
    PART_NxN = 3,
    PART_2NxnU = 4,
    PART_2NxnD = 5,
    PART_nLx2N = 6,
    PART_nRx2N = 7,
}

impl PartMode {
    /// Number of prediction blocks the coding block is divided into.
    pub fn num_parts(self) -> usize {
        use self::PartMode::*;
        match self {
            PART_2Nx2N => 1,
            PART_NxN => 4,
            _ => 2,
        }
    }

    /// Prediction block rectangles `(x, y, w, h)` relative to the coding block origin.
    pub fn parts(self, cb_size: u16) -> Vec<(u16, u16, u16, u16)> {
        use self::PartMode::*;
        let s = cb_size;
        let h = s >> 1;
        let q = s >> 2;
        match self {
            PART_2Nx2N => vec![(0, 0, s, s)],
            PART_2NxN => vec![(0, 0, s, h), (0, h, s, h)],
            PART_Nx2N => vec![(0, 0, h, s), (h, 0, h, s)],
            PART_NxN => vec![(0, 0, h, h), (h, 0, h, h), (0, h, h, h), (h, h, h, h)],
            PART_2NxnU => vec![(0, 0, s, q), (0, q, s, s - q)],
            PART_2NxnD => vec![(0, 0, s, s - q), (0, s - q, s, q)],
            PART_nLx2N => vec![(0, 0, q, s), (q, 0, s - q, s)],
            PART_nRx2N => vec![(0, 0, s - q, s), (s - q, 0, q, s)],
        }
    }

    /// Index of the prediction block covering `(dx, dy)` inside the coding block.
    pub fn part_index(self, cb_size: u16, dx: u16, dy: u16) -> usize {
        self.parts(cb_size)
            .iter()
            .position(|&(x, y, w, h)| dx >= x && dx < x + w && dy >= y && dy < y + h)
            .unwrap_or(0)
    }
}

impl From<u8> for PartMode {
    fn from(val: u8) -> Self {
        use self::PartMode::*;
        match val {
            1 => PART_2NxN,
            2 => PART_Nx2N,
            3 => PART_NxN,
            4 => PART_2NxnU,
            5 => PART_2NxnD,
            6 => PART_nLx2N,
            7 => PART_nRx2N,
            _ => PART_2Nx2N,
        }
    }
}

impl Default for PartMode {
    fn default() -> Self {
        PartMode::PART_2Nx2N
    }
}

#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Rational {
    pub num: u64,
    pub den: u64,
}

impl Rational {
    pub fn new(num: u64, den: u64) -> Self {
        Rational { num, den }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational { num: 25, den: 1 }
    }
}
