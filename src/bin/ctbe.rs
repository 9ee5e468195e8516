mod common;
mod io;

use clap::{App, AppSettings, Arg, ArgMatches};

use std::fs::File;
use std::io::prelude::*;

use common::*;
use ctbtree::api::*;
use ctbtree::{default_algo, EncoderContext};
use io::*;

struct CLISettings {
    pub input: Box<dyn demuxer::Demuxer>,
    pub output: Option<Box<dyn Write>>,
    pub rec: Option<Box<dyn muxer::Muxer>>,
    pub enc: EncoderConfig,
    pub frames: usize,
    pub verbose: bool,
}

pub trait MatchGet {
    fn value_of_int(&self, name: &str) -> Option<Result<i64, CtbError>>;
}

impl MatchGet for ArgMatches<'_> {
    fn value_of_int(&self, name: &str) -> Option<Result<i64, CtbError>> {
        self.value_of(name).map(|v| {
            v.parse()
                .map_err(|e| CtbError::InvalidConfig(format!("{}: {}", name, e)))
        })
    }
}

fn log2_of_size(matches: &ArgMatches<'_>, name: &str) -> Result<u8, CtbError> {
    let size = matches.value_of_int(name).unwrap_or(Ok(0))?;
    if size <= 0 || size & (size - 1) != 0 {
        return Err(CtbError::InvalidConfig(format!(
            "{} must be a power of two, got {}",
            name, size
        )));
    }
    Ok(size.trailing_zeros() as u8)
}

fn parse_config(
    matches: &ArgMatches<'_>,
    info: &demuxer::VideoInfo,
) -> Result<EncoderConfig, CtbError> {
    let qp = matches.value_of_int("QP").unwrap_or(Ok(27))?;
    if !(0..=51).contains(&qp) {
        return Err(CtbError::InvalidConfig("quantizer must be between 0-51".to_owned()));
    }
    let tu_depth = matches.value_of_int("MAX_TU_DEPTH").unwrap_or(Ok(1))?;

    let cfg = EncoderConfig {
        width: info.width,
        height: info.height,
        time_base: info.time_base,
        bit_depth: info.bit_depth,
        key_frame_interval: matches.value_of_int("KEYFRAME_INTERVAL").unwrap_or(Ok(0))? as u64,
        qp: qp as u8,
        log2_ctb_size: log2_of_size(matches, "CTB_SIZE")?,
        log2_min_cb_size: log2_of_size(matches, "MIN_CB_SIZE")?,
        log2_max_tb_size: log2_of_size(matches, "MAX_TB_SIZE")?,
        max_transform_hierarchy_depth_intra: tu_depth as u8,
        max_transform_hierarchy_depth_inter: tu_depth as u8,
        pcm_enabled: matches.is_present("PCM"),
        transquant_bypass_enabled: matches.is_present("LOSSLESS"),
        ..Default::default()
    };
    cfg.validate()?;
    Ok(cfg)
}

fn parse_cli() -> Result<CLISettings, CtbError> {
    let app = App::new("ctbe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Rate-distortion optimised coding tree encoder")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("INPUT")
                .help("file name of input video (y4m, 4:2:0)")
                .short("i")
                .long("input")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("OUTPUT")
                .help("file name of the coded CTB payload")
                .short("o")
                .long("output")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("RECON")
                .help("file name of reconstructed video (.y4m or raw yuv)")
                .short("r")
                .long("recon")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("QP")
                .help("QP value (0-51)")
                .short("q")
                .long("qp")
                .takes_value(true)
                .default_value("27"),
        )
        .arg(
            Arg::with_name("KEYFRAME_INTERVAL")
                .help("interval between intra pictures, 0 for the first one only")
                .short("p")
                .long("keyint")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name("CTB_SIZE")
                .help("coding tree block size (16, 32, 64)")
                .long("ctb-size")
                .takes_value(true)
                .default_value("32"),
        )
        .arg(
            Arg::with_name("MIN_CB_SIZE")
                .help("minimum coding block size")
                .long("min-cb-size")
                .takes_value(true)
                .default_value("8"),
        )
        .arg(
            Arg::with_name("MAX_TB_SIZE")
                .help("maximum transform block size")
                .long("max-tb-size")
                .takes_value(true)
                .default_value("16"),
        )
        .arg(
            Arg::with_name("MAX_TU_DEPTH")
                .help("maximum transform tree depth below a coding block")
                .long("max-tu-depth")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name("PCM")
                .help("allow PCM coding blocks")
                .long("pcm"),
        )
        .arg(
            Arg::with_name("LOSSLESS")
                .help("bypass transform and quantization")
                .long("lossless"),
        )
        .arg(
            Arg::with_name("FRAMES")
                .help("maximum number of frames to be encoded, 0 for all")
                .short("f")
                .long("frames")
                .takes_value(true)
                .default_value("0"),
        )
        // DEBUGGING
        .arg(
            Arg::with_name("VERBOSE")
                .help("Verbose logging; outputs info for every frame")
                .long("verbose")
                .short("v"),
        );

    let matches = app.get_matches();

    let input = demuxer::new(matches.value_of("INPUT").unwrap_or("-"))?;
    let info = input.info();
    let enc = parse_config(&matches, &info)?;

    let output: Option<Box<dyn Write>> = match matches.value_of("OUTPUT") {
        Some("-") => Some(Box::new(std::io::stdout())),
        Some(f) => Some(Box::new(File::create(f)?)),
        None => None,
    };
    let rec = match matches.value_of("RECON") {
        Some(recon) => Some(muxer::new(recon, info.time_base)?),
        None => None,
    };

    Ok(CLISettings {
        input,
        output,
        rec,
        enc,
        frames: matches.value_of_int("FRAMES").unwrap_or(Ok(0))?.max(0) as usize,
        verbose: matches.is_present("VERBOSE"),
    })
}

fn main() -> Result<(), CtbError> {
    let mut cli = parse_cli()?;
    let mut ectx = EncoderContext::new(&cli.enc)?;
    let mut algo = default_algo();
    let mut progress = ProgressInfo::new(cli.enc.time_base);

    while cli.frames == 0 || progress.frames_encoded() < cli.frames {
        let pic = match cli.input.read()? {
            Some(pic) => pic,
            None => break,
        };

        let stats = ectx.encode_frame(pic, &mut algo)?;
        if let Some(output) = cli.output.as_mut() {
            output.write_all(&stats.data)?;
        }
        if let Some(rec) = cli.rec.as_mut() {
            rec.write(&ectx.img)?;
        }

        let summary = FrameSummary::from(&stats);
        if cli.verbose {
            eprintln!("{}", summary);
        }
        progress.add_frame(summary);
    }

    if let Some(output) = cli.output.as_mut() {
        output.flush()?;
    }
    eprintln!("{}", progress);
    eprintln!("{}", progress.print_summary());
    Ok(())
}
