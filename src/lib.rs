//! Person tracking overlays and subject preview cropping for live camera feeds.
//!
//! Camera frames flow through a [`FrameDispatcher`] running on a background thread. It produces
//! a square preview of the primary detected person for every frame, and periodically runs a
//! [`Detector`] whose output becomes tracking boxes, one per detected person. The UI thread
//! applies the results with a [`Presenter`].
//!
//! # Coordinates
//!
//! Detectors report *normalized* boxes: fractions of the image width and height, with the origin
//! in the **bottom-left** corner and Y pointing up.
//!
//! Everything else (overlay boxes, crop rectangles, images) uses pixel coordinates with the origin
//! in the **top-left** corner and Y pointing down. The conversions live in [`mapping`].
//!
//! # Environment Variables
//!
//! [`Options::from_env`] reads the following variables:
//!
//! * `HUDET_DETECT_INTERVAL`: number of frames between two detector runs (default: 60).
//! * `HUDET_CONFIDENCE`: confidence a detection has to exceed to get a tracking box (default: 0.5).
//! * `HUDET_LABEL`: label of the detections to track (default: `person`).
//! * `HUDET_PADDING`: padding around tracking boxes, in pixels, as `h,v` or a single number
//!   (default: 0).
//! * `HUDET_PREVIEW`: what the preview shows when nobody is detected: `full` (the whole frame,
//!   default), `hold` (the last preview), or `clear` (nothing).
//! * `HUDET_OVERLAY_FIT`: how the live feed is laid out in the overlay view: `stretch` (default) or
//!   `fill` (aspect fill).
//!
//! The `hudet` binary additionally reads `HUDET_ORIENTATION` (`portrait`, `portrait-upside-down`,
//! `landscape-left`, `landscape-right`, `face-up`, `face-down`, `unknown`) and `HUDET_FACING`
//! (`front` or `back`).
//!
//! [`FrameDispatcher`]: dispatch::FrameDispatcher
//! [`Detector`]: detection::Detector
//! [`Presenter`]: dispatch::Presenter
//! [`Options::from_env`]: config::Options::from_env

use log::LevelFilter;

pub mod affine;
pub mod capture;
pub mod config;
pub mod detection;
pub mod dispatch;
pub mod display;
pub mod image;
pub mod mapping;
pub mod num;
pub mod orientation;
pub mod overlay;
pub mod preview;
pub mod rect;
pub mod replay;
pub mod resolution;
pub mod timer;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, unless overridden with `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
