#![allow(non_snake_case)]

use std::fmt::Display;
use std::io::Write;

#[cfg(feature = "trace")]
use std::fs::OpenOptions;

use crate::api::PredMode;

pub(crate) type Tracer = (Box<dyn Write>, isize);

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "trace")]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    let fp_trace = OpenOptions::new()
        .append(true)
        .create(true)
        .open("enc_trace.txt");
    if let Ok(fp) = fp_trace {
        Some((Box::new(fp), 0))
    } else {
        None
    }
}

#[cfg(feature = "trace")]
pub(crate) fn CTB_TRACE_COUNTER(tracer: &mut Option<Tracer>) {
    if let Some((writer, counter)) = tracer {
        let _ = writer.write_fmt(format_args!("{} \t", *counter));
        *counter += 1;
    }
}

#[cfg(feature = "trace")]
pub(crate) fn CTB_TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {
    if let Some((writer, _)) = tracer {
        let _ = writer.write_fmt(format_args!("{}", name));
    }
}

#[cfg(feature = "trace_cu")]
pub(crate) fn TRACE_CU(
    tracer: &mut Option<Tracer>,
    x: u16,
    y: u16,
    log2_size: u8,
    split: bool,
    pred_mode: Option<PredMode>,
    cost: f64,
) {
    CTB_TRACE_COUNTER(tracer);
    CTB_TRACE(tracer, "cu x ");
    CTB_TRACE(tracer, x);
    CTB_TRACE(tracer, " y ");
    CTB_TRACE(tracer, y);
    CTB_TRACE(tracer, " size ");
    CTB_TRACE(tracer, 1 << log2_size);
    if split {
        CTB_TRACE(tracer, " split");
    } else if let Some(mode) = pred_mode {
        CTB_TRACE(tracer, " ");
        CTB_TRACE(tracer, mode);
    }
    CTB_TRACE(tracer, " cost ");
    CTB_TRACE(tracer, cost);
    CTB_TRACE(tracer, " \n");
}

#[cfg(not(feature = "trace"))]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    None
}

#[cfg(not(feature = "trace"))]
pub(crate) fn CTB_TRACE_COUNTER(_tracer: &mut Option<Tracer>) {}

#[cfg(not(feature = "trace"))]
pub(crate) fn CTB_TRACE<T: Display>(_tracer: &mut Option<Tracer>, _name: T) {}

#[cfg(not(feature = "trace_cu"))]
pub(crate) fn TRACE_CU(
    _tracer: &mut Option<Tracer>,
    _x: u16,
    _y: u16,
    _log2_size: u8,
    _split: bool,
    _pred_mode: Option<PredMode>,
    _cost: f64,
) {
}
