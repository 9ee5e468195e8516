use std::rc::Rc;

use crate::api::*;

/*****************************************************************************
 * sequence parameter set
 *****************************************************************************/
#[derive(Debug, Clone, Default)]
pub struct Sps {
    pub pic_width_in_luma_samples: u16,
    pub pic_height_in_luma_samples: u16,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub log2_ctb_size: u8,
    pub log2_min_cb_size: u8,
    pub log2_min_tb_size: u8,
    pub log2_max_tb_size: u8,
    pub max_transform_hierarchy_depth_intra: u8,
    pub max_transform_hierarchy_depth_inter: u8,
    pub pcm_enabled_flag: bool,
    pub log2_min_pcm_cb_size: u8,
    pub log2_max_pcm_cb_size: u8,
    pub pcm_sample_bit_depth_luma: u8,
    pub pcm_sample_bit_depth_chroma: u8,
}

impl Sps {
    pub fn from_config(cfg: &EncoderConfig) -> Self {
        Sps {
            pic_width_in_luma_samples: cfg.width as u16,
            pic_height_in_luma_samples: cfg.height as u16,
            bit_depth_luma: cfg.bit_depth as u8,
            bit_depth_chroma: cfg.bit_depth as u8,
            log2_ctb_size: cfg.log2_ctb_size,
            log2_min_cb_size: cfg.log2_min_cb_size,
            log2_min_tb_size: cfg.log2_min_tb_size,
            log2_max_tb_size: cfg.log2_max_tb_size,
            max_transform_hierarchy_depth_intra: cfg.max_transform_hierarchy_depth_intra,
            max_transform_hierarchy_depth_inter: cfg.max_transform_hierarchy_depth_inter,
            pcm_enabled_flag: cfg.pcm_enabled,
            log2_min_pcm_cb_size: cfg.log2_min_cb_size,
            log2_max_pcm_cb_size: cfg.log2_ctb_size.min(5),
            pcm_sample_bit_depth_luma: cfg.bit_depth as u8,
            pcm_sample_bit_depth_chroma: cfg.bit_depth as u8,
        }
    }

    pub fn pic_width_in_ctbs(&self) -> usize {
        (self.pic_width_in_luma_samples as usize + (1 << self.log2_ctb_size) - 1)
            >> self.log2_ctb_size
    }

    pub fn pic_height_in_ctbs(&self) -> usize {
        (self.pic_height_in_luma_samples as usize + (1 << self.log2_ctb_size) - 1)
            >> self.log2_ctb_size
    }
}

/*****************************************************************************
 * picture parameter set
 *****************************************************************************/
#[derive(Debug, Clone, Default)]
pub struct Pps {
    pub sps: Rc<Sps>,
    pub init_qp: u8,
    pub transquant_bypass_enabled_flag: bool,
    pub num_ref_idx_l0_default_active: u8,
}

impl Pps {
    pub fn new(sps: Rc<Sps>, cfg: &EncoderConfig) -> Self {
        Pps {
            sps,
            init_qp: cfg.qp,
            transquant_bypass_enabled_flag: cfg.transquant_bypass_enabled,
            num_ref_idx_l0_default_active: 1,
        }
    }
}

/*****************************************************************************
 * slice segment header
 *****************************************************************************/
#[derive(Debug, Clone, Default)]
pub struct SliceHeader {
    pub first_slice_segment_in_pic_flag: bool,
    pub slice_segment_address: usize,
    pub slice_type: SliceType,
    pub slice_qp: u8,
    pub num_ref_idx_l0_active: u8,
}

impl SliceHeader {
    pub fn new(slice_type: SliceType, slice_qp: u8) -> Self {
        SliceHeader {
            first_slice_segment_in_pic_flag: true,
            slice_segment_address: 0,
            slice_type,
            slice_qp,
            num_ref_idx_l0_active: if slice_type.is_intra_only() { 0 } else { 1 },
        }
    }
}
