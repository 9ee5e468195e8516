use crate::com::context::*;

/// Sink for the binarized syntax of a coding tree.
pub trait EntropyEncoder {
    /// Codes `bin` with the adaptive model `ctx`.
    fn encode_bin(&mut self, ctx: Ctx, bin: bool);

    /// Codes the `num_bits` least significant bits of `value` with equal probability, MSB first.
    fn encode_bypass(&mut self, value: u32, num_bits: u32);

    fn encode_term_bin(&mut self, bin: bool);
}

/// How a [`CabacEstimator`] treats its context models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateEstimation {
    /// Models adapt after every bin, like the real coder.
    Adaptive,
    /// Models stay frozen at their input state.
    Constant,
}

impl Default for RateEstimation {
    fn default() -> Self {
        RateEstimation::Adaptive
    }
}

/// Counts the fractional bits a sequence of bins would cost.
pub struct CabacEstimator<'a> {
    models: &'a mut ContextModelTable,
    method: RateEstimation,
    frac_bits: i64,
}

impl<'a> CabacEstimator<'a> {
    pub fn new(models: &'a mut ContextModelTable, method: RateEstimation) -> Self {
        CabacEstimator {
            models,
            method,
            frac_bits: 0,
        }
    }

    /// Bits counted since creation or the last [`CabacEstimator::reset_rate`].
    pub fn rate(&self) -> f32 {
        (self.frac_bits as f64 / FRAC_BITS_SCALE) as f32
    }

    pub fn reset_rate(&mut self) {
        self.frac_bits = 0;
    }

    pub fn models(&self) -> &ContextModelTable {
        self.models
    }
}

impl<'a> EntropyEncoder for CabacEstimator<'a> {
    fn encode_bin(&mut self, ctx: Ctx, bin: bool) {
        let model = self.models.model_mut(ctx);
        self.frac_bits += biari_no_bits(bin, *model) as i64;
        if self.method == RateEstimation::Adaptive {
            update_model(model, bin);
        }
    }

    fn encode_bypass(&mut self, _value: u32, num_bits: u32) {
        self.frac_bits += num_bits as i64 * FRAC_BITS_SCALE as i64;
    }

    fn encode_term_bin(&mut self, bin: bool) {
        // the terminating bin has a fixed LPS range of 2 out of 510
        if bin {
            self.frac_bits += 7 * FRAC_BITS_SCALE as i64;
        }
    }
}

/// Binary arithmetic coder producing the CTB payload bytes.
pub struct SbacWriter {
    models: ContextModelTable,
    range: u32,
    code: u32,
    code_bits: u32,
    stacked_ff: u32,
    stacked_zero: u32,
    pending_byte: u32,
    is_pending_byte: bool,
    bin_counter: u32,
    data: Vec<u8>,
}

impl Default for SbacWriter {
    fn default() -> Self {
        SbacWriter::new()
    }
}

impl SbacWriter {
    pub fn new() -> Self {
        SbacWriter {
            models: ContextModelTable::default(),
            range: 16384,
            code: 0,
            code_bits: 11,
            stacked_ff: 0,
            stacked_zero: 0,
            pending_byte: 0,
            is_pending_byte: false,
            bin_counter: 0,
            data: vec![],
        }
    }

    /// Restarts coding at a slice boundary.
    pub fn reset(&mut self) {
        *self = SbacWriter::new();
    }

    pub fn models(&self) -> &ContextModelTable {
        &self.models
    }

    pub fn bin_count(&self) -> u32 {
        self.bin_counter
    }

    /// Flushes the coder and hands out the bytes written since the last reset.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut tmp = (self.code + self.range - 1) & (0xFFFF_FFFF << 14);
        if tmp < self.code {
            tmp += 8192;
        }

        self.code = tmp << self.code_bits;
        self.carry_propagate();

        self.code <<= 8;
        self.carry_propagate();

        while self.stacked_zero > 0 {
            self.data.push(0x00);
            self.stacked_zero -= 1;
        }

        if self.pending_byte != 0 {
            self.data.push(self.pending_byte as u8);
        } else if self.code_bits < 4 {
            // zero bits up to the next byte boundary
            self.data.push(0x00);
        }

        let data = std::mem::replace(&mut self.data, vec![]);
        self.reset();
        data
    }

    fn carry_propagate(&mut self) {
        let out_bits = self.code >> 17;

        self.code &= (1 << 17) - 1;

        if out_bits < 0xFF {
            while self.stacked_ff != 0 {
                self.put_byte(0xFF);
                self.stacked_ff -= 1;
            }
            self.put_byte(out_bits as u8);
        } else if out_bits > 0xFF {
            self.pending_byte += 1;
            while self.stacked_ff != 0 {
                self.put_byte(0x00);
                self.stacked_ff -= 1;
            }
            self.put_byte((out_bits & 0xFF) as u8);
        } else {
            self.stacked_ff += 1;
        }
    }

    fn put_byte(&mut self, writing_byte: u8) {
        if self.is_pending_byte {
            if self.pending_byte == 0 {
                self.stacked_zero += 1;
            } else {
                while self.stacked_zero > 0 {
                    self.data.push(0x00);
                    self.stacked_zero -= 1;
                }
                self.data.push(self.pending_byte as u8);
            }
        }
        self.pending_byte = writing_byte as u32;
        self.is_pending_byte = true;
    }

    fn renorm(&mut self) {
        while self.range < 8192 {
            self.range <<= 1;
            self.code <<= 1;
            self.code_bits -= 1;

            if self.code_bits == 0 {
                self.carry_propagate();
                self.code_bits = 8;
            }
        }
    }

    fn encode_bin_ep(&mut self, bin: bool) {
        self.bin_counter += 1;

        self.range >>= 1;
        if bin {
            self.code += self.range;
        }
        self.range <<= 1;
        self.code <<= 1;

        self.code_bits -= 1;
        if self.code_bits == 0 {
            self.carry_propagate();
            self.code_bits = 8;
        }
    }
}

impl EntropyEncoder for SbacWriter {
    fn encode_bin(&mut self, ctx: Ctx, bin: bool) {
        self.bin_counter += 1;

        let model = self.models.model_mut(ctx);
        let state = (*model as u32) >> 1;
        let mps = (*model & 1) == 1;

        let mut lps = (state * self.range) >> 9;
        lps = if lps < 437 { 437 } else { lps };

        self.range -= lps;

        if bin != mps {
            if self.range >= lps {
                self.code += self.range;
                self.range = lps;
            }
        }
        update_model(model, bin);

        self.renorm();
    }

    fn encode_bypass(&mut self, value: u32, num_bits: u32) {
        for bit in (0..num_bits).rev() {
            self.encode_bin_ep((value >> bit) & 1 != 0);
        }
    }

    fn encode_term_bin(&mut self, bin: bool) {
        self.bin_counter += 1;

        self.range -= 1;
        if bin {
            self.code += self.range;
            self.range = 1;
        }

        self.renorm();
    }
}
