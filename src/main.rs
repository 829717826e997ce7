//! Replays a recorded camera feed through the tracking pipeline.
//!
//! Usage: `hudet <frames-dir> <out-dir> [detections.json]`
//!
//! Frames are read from `<frames-dir>` in file name order, previews and overlay renders are
//! written to `<out-dir>`. Without a detections file, the pipeline runs without detector.

use std::env;

use anyhow::bail;
use hudet::{
    capture::{CaptureSource, FrameSequence, Session},
    config::{self, Options},
    detection::Detector,
    dispatch::{FrameDispatcher, Presenter},
    display::ImageDirSink,
    orientation::{OrientationState, SharedOrientation},
    replay::ReplayDetector,
    timer::FpsCounter,
};

fn main() -> anyhow::Result<()> {
    hudet::init_logger!();

    let mut args = env::args_os().skip(1);
    let (Some(frames_dir), Some(out_dir)) = (args.next(), args.next()) else {
        bail!("usage: hudet <frames-dir> <out-dir> [detections.json]");
    };
    let detections = args.next();

    let options = Options::from_env()?;
    let orientation = SharedOrientation::new(config::orientation_from_env(
        OrientationState::default(),
    )?);
    let source = FrameSequence::open(&frames_dir, orientation.snapshot().facing)?;

    let view = options.get_view().unwrap_or_else(|| {
        orientation
            .snapshot()
            .frame_transform()
            .output_resolution(source.resolution())
    });

    let detector: Option<Box<dyn Detector>> = match detections {
        Some(path) => Some(Box::new(ReplayDetector::load(path)?)),
        None => None,
    };

    let (ui_sender, ui_receiver) = crossbeam::channel::unbounded();
    let mut dispatcher = FrameDispatcher::new(detector, &options).spawn(ui_sender)?;
    let mut presenter = Presenter::new(
        ImageDirSink::new(&out_dir, view)?,
        view,
        options.get_padding(),
    );
    let mut session = Session::new(source, orientation);

    let mut fps = FpsCounter::new("capture");
    while let Some(event) = session.next_event() {
        dispatcher.send(event);

        for update in ui_receiver.try_iter() {
            presenter.apply(update)?;
        }

        fps.tick_with(session.source().timers());
    }

    // Dropping the worker lets it finish its last frame and disconnect the channel.
    drop(dispatcher);
    for update in ui_receiver {
        presenter.apply(update)?;
    }

    let count = presenter.count();
    let sink = presenter.into_sink();
    log::info!(
        "wrote {} previews and {} overlay renders to '{}' (last object count: {})",
        sink.previews_written(),
        sink.overlays_written(),
        sink.dir().display(),
        count
    );

    Ok(())
}
