use ctbtree::api::*;
use ctbtree::PictureStats;

use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct FrameSummary {
    pub frame_number: u64,
    pub slice_type: SliceType,
    // coded payload in bytes
    pub size: usize,
    pub num_cbs: usize,
    pub psnr: [f64; 3],
}

impl From<&PictureStats> for FrameSummary {
    fn from(stats: &PictureStats) -> Self {
        Self {
            frame_number: stats.frame_number,
            slice_type: stats.slice_type,
            size: stats.bytes(),
            num_cbs: stats.num_cbs,
            psnr: stats.psnr,
        }
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {} - {} - {} bytes - {} CBs - PSNR Y {:.2} U {:.2} V {:.2}",
            self.frame_number,
            self.slice_type,
            self.size,
            self.num_cbs,
            self.psnr[0],
            self.psnr[1],
            self.psnr[2],
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    // Frame rate of the video
    frame_rate: Rational,
    // The time the encode was started
    time_started: Instant,
    // List of frames encoded so far
    frame_info: Vec<FrameSummary>,
    // Total coded size so far
    encoded_size: usize,
}

impl ProgressInfo {
    pub fn new(frame_rate: Rational) -> Self {
        Self {
            frame_rate,
            time_started: Instant::now(),
            frame_info: vec![],
            encoded_size: 0,
        }
    }

    pub fn add_frame(&mut self, frame: FrameSummary) {
        self.encoded_size += frame.size;
        self.frame_info.push(frame);
    }

    pub fn frames_encoded(&self) -> usize {
        self.frame_info.len()
    }

    pub fn encoding_fps(&self) -> f64 {
        let duration = Instant::now().duration_since(self.time_started);
        self.frame_info.len() as f64 / duration.as_secs_f64().max(1e-6)
    }

    pub fn video_fps(&self) -> f64 {
        self.frame_rate.num as f64 / self.frame_rate.den.max(1) as f64
    }

    // Returns the bitrate of the frames so far, in bits/second
    pub fn bitrate(&self) -> usize {
        if self.frame_info.is_empty() {
            return 0;
        }
        let bits = self.encoded_size * 8;
        let seconds = self.frame_info.len() as f64 / self.video_fps();
        (bits as f64 / seconds) as usize
    }

    pub fn average_psnr(&self) -> [f64; 3] {
        let n = self.frame_info.len().max(1) as f64;
        let mut avg = [0.0; 3];
        for frame in &self.frame_info {
            for (a, p) in avg.iter_mut().zip(frame.psnr.iter()) {
                *a += p / n;
            }
        }
        avg
    }

    // Number of frames of given type which appear in the video
    pub fn get_frame_type_count(&self, slice_type: SliceType) -> usize {
        self.frame_info
            .iter()
            .filter(|frame| frame.slice_type == slice_type)
            .count()
    }

    pub fn print_summary(&self) -> String {
        let psnr = self.average_psnr();
        format!(
            "I: {:>6}, P: {:>6}, {} bytes, {} kb/s, PSNR Y {:.2} U {:.2} V {:.2}",
            self.get_frame_type_count(SliceType::I),
            self.get_frame_type_count(SliceType::P),
            self.encoded_size,
            self.bitrate() / 1000,
            psnr[0],
            psnr[1],
            psnr[2],
        )
    }
}

impl fmt::Display for ProgressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "encoded {} frames, {:.3} fps",
            self.frames_encoded(),
            self.encoding_fps()
        )
    }
}
