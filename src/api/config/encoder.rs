use crate::api::*;

// Largest coding tree block of the HEVC profiles, 64x64.
pub const MAX_LOG2_CTB_SIZE: u8 = 6;
pub const MIN_LOG2_CB_SIZE: u8 = 3;
pub const MIN_LOG2_TB_SIZE: u8 = 2;
pub const MAX_LOG2_TB_SIZE: u8 = 5;

// Encoder settings which impact the decided coding tree.
#[derive(Clone, Copy, Debug)]
pub struct EncoderConfig {
    // output size
    // Width of the frames in pixels.
    pub width: usize,
    // Height of the frames in pixels.
    pub height: usize,
    // Video time base.
    pub time_base: Rational,

    // Bit depth.
    pub bit_depth: usize,

    // The *maximum* interval between two intra-only pictures, 0 means only the first.
    pub key_frame_interval: u64,

    // The base quantizer to use.
    pub qp: u8,

    // coding tree geometry
    pub log2_ctb_size: u8,
    pub log2_min_cb_size: u8,
    pub log2_min_tb_size: u8,
    pub log2_max_tb_size: u8,
    pub max_transform_hierarchy_depth_intra: u8,
    pub max_transform_hierarchy_depth_inter: u8,

    // coding tools
    pub pcm_enabled: bool,
    pub transquant_bypass_enabled: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            width: 0,
            height: 0,
            time_base: Rational::default(),
            bit_depth: 8,
            key_frame_interval: 0,
            qp: 27,
            log2_ctb_size: 5,
            log2_min_cb_size: MIN_LOG2_CB_SIZE,
            log2_min_tb_size: MIN_LOG2_TB_SIZE,
            log2_max_tb_size: 4,
            max_transform_hierarchy_depth_intra: 1,
            max_transform_hierarchy_depth_inter: 1,
            pcm_enabled: false,
            transquant_bypass_enabled: false,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), CtbError> {
        fn check(cond: bool, msg: &str) -> Result<(), CtbError> {
            if cond {
                Ok(())
            } else {
                Err(CtbError::InvalidConfig(msg.to_owned()))
            }
        }

        check(self.width > 0 && self.height > 0, "picture size must be non-zero")?;
        check(
            self.width % (1 << self.log2_min_cb_size) == 0
                && self.height % (1 << self.log2_min_cb_size) == 0,
            "picture size must be a multiple of the minimum coding block size",
        )?;
        check(
            self.bit_depth >= 8 && self.bit_depth <= 12,
            "bit depth must be between 8 and 12",
        )?;
        check(self.qp <= 51, "quantizer must be between 0-51")?;
        check(
            self.log2_ctb_size <= MAX_LOG2_CTB_SIZE && self.log2_ctb_size >= 4,
            "CTB size must be 16, 32 or 64",
        )?;
        check(
            self.log2_min_cb_size >= MIN_LOG2_CB_SIZE
                && self.log2_min_cb_size <= self.log2_ctb_size,
            "minimum coding block size must lie between 8 and the CTB size",
        )?;
        check(
            self.log2_min_tb_size >= MIN_LOG2_TB_SIZE
                && self.log2_min_tb_size < self.log2_min_cb_size,
            "minimum transform block size must be 4 and smaller than the minimum coding block",
        )?;
        check(
            self.log2_max_tb_size <= MAX_LOG2_TB_SIZE
                && self.log2_max_tb_size >= self.log2_min_tb_size
                && self.log2_max_tb_size <= self.log2_ctb_size,
            "maximum transform block size must lie between the minimum size and min(32, CTB size)",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cfg_352x288() -> EncoderConfig {
        EncoderConfig {
            width: 352,
            height: 288,
            ..Default::default()
        }
    }

    #[test]
    fn default_geometry_is_valid() {
        assert!(cfg_352x288().validate().is_ok());
    }

    #[test]
    fn rejects_oversized_ctb() {
        let cfg = EncoderConfig {
            log2_ctb_size: 7,
            ..cfg_352x288()
        };
        match cfg.validate() {
            Err(CtbError::InvalidConfig(msg)) => assert!(msg.contains("CTB")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_unaligned_picture() {
        let cfg = EncoderConfig {
            width: 350,
            ..cfg_352x288()
        };
        assert!(cfg.validate().is_err());
    }
}
