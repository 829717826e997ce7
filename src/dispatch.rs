//! Per-frame processing: preview composition, throttled detection and UI updates.
//!
//! The [`FrameDispatcher`] runs on a background worker thread (see [`FrameDispatcher::spawn`]).
//! For every camera frame it produces a new subject preview, and every
//! [`detect_interval`](crate::config::Options::detect_interval) frames it also runs the detector
//! and turns its output into a [`DetectionReport`]. All of that is sent to the UI thread as
//! [`UiUpdate`]s, where a [`Presenter`] applies them to the overlay registry and the display.

use std::{io, marker::PhantomData};

use crossbeam::channel::Sender;
use nalgebra::Matrix3;
use pawawwewism::Worker;

use crate::{
    config::Options,
    detection::{
        check_well_formed, DetectRequest, Detection, DetectionFilter, DetectionId, Detector,
        SubjectSelector,
    },
    display::DisplaySink,
    image::Image,
    mapping::{crop_rect, overlay_rect, OverlayFit},
    orientation::{OrientationState, VideoOrientation},
    overlay::{OverlayRegistry, Padding},
    preview::{Compositor, PreviewUpdate},
    rect::Rect,
    resolution::Resolution,
    timer::{FpsCounter, Timer},
};

/// Fixed-interval invocation policy for the detector.
///
/// Every frame increments a counter. Once the counter exceeds the interval, the detector runs and
/// the counter starts over at 0. With an interval of 60, the detector runs on frames 61, 122, …
///
/// The reset happens in [`Throttle::tick`], before the detector is invoked. Nothing observes the
/// counter while the detector runs, so this is the same as resetting right after the invocation.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: u32,
    count: u32,
}

impl Throttle {
    pub fn new(interval: u32) -> Self {
        Self { interval, count: 0 }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Returns the number of frames counted since the last detector run.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Counts a frame and returns whether the detector should run on it.
    ///
    /// When this returns `true`, the counter has already been reset to 0.
    pub fn tick(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count > self.interval {
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Counts a frame that cannot be processed.
    ///
    /// If the detector is due, it runs on the next frame that can be processed instead.
    pub fn skip(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

/// A captured camera frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The raw frame, or [`None`] if the capture device did not deliver a pixel buffer.
    pub image: Option<Image>,
    /// Orientation at the time the frame was captured.
    pub orientation: OrientationState,
    pub intrinsics: Option<Matrix3<f32>>,
}

/// Input of the [`FrameDispatcher`].
#[derive(Debug, Clone)]
pub enum FrameEvent {
    Frame(Frame),
    /// The capture device dropped a frame.
    Dropped,
}

/// Result of one detector run, ready to be presented.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    /// Size of the overlay view the boxes were computed for.
    pub view: Resolution,
    /// Tracking boxes of all confident detections, in view coordinates.
    pub boxes: Vec<(DetectionId, Rect)>,
    /// Number of detections with the tracked label, confident or not.
    pub count: usize,
    /// The subject shown in the preview.
    pub subject: Option<DetectionId>,
}

/// A change to apply on the UI thread.
#[derive(Debug, Clone)]
pub enum UiUpdate {
    /// The device orientation changed; the live preview has to be rendered in this orientation.
    VideoOrientation(VideoOrientation),
    Preview(PreviewUpdate),
    Detections(DetectionReport),
}

/// Turns camera frames into [`UiUpdate`]s.
pub struct FrameDispatcher {
    detector: Option<Box<dyn Detector>>,
    throttle: Throttle,
    filter: DetectionFilter,
    selector: SubjectSelector,
    compositor: Compositor,
    aspect_fill: bool,
    view: Option<Resolution>,
    crop: Option<Rect>,
    video: Option<VideoOrientation>,
    t_detect: Timer,
    fps: FpsCounter,
}

impl FrameDispatcher {
    /// Creates a dispatcher.
    ///
    /// Without a `detector`, the dispatcher runs in degraded mode: previews are produced, but
    /// nothing is ever detected.
    pub fn new(detector: Option<Box<dyn Detector>>, options: &Options) -> Self {
        if detector.is_none() {
            log::warn!("no detector available, running without person detection");
        }

        Self {
            detector,
            throttle: Throttle::new(options.get_detect_interval()),
            filter: options.get_filter().clone(),
            selector: SubjectSelector::new(),
            compositor: Compositor::new(options.get_preview_policy()),
            aspect_fill: options.get_aspect_fill(),
            view: options.get_view(),
            crop: None,
            video: None,
            t_detect: Timer::new("detect"),
            fps: FpsCounter::new("dispatcher"),
        }
    }

    /// Returns the current crop rectangle, in pixel coordinates of the oriented frame.
    pub fn crop(&self) -> Option<&Rect> {
        self.crop.as_ref()
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Processes a single frame event.
    ///
    /// The preview is always composed with the crop rectangle of the previous detector run,
    /// before the detector (if due) runs on the frame.
    pub fn process(&mut self, event: FrameEvent) -> Vec<UiUpdate> {
        let frame = match event {
            FrameEvent::Frame(frame) => frame,
            FrameEvent::Dropped => {
                log::trace!("dropped frame");
                self.throttle.skip();
                return Vec::new();
            }
        };
        let Some(image) = frame.image else {
            log::trace!("frame without pixel buffer");
            self.throttle.skip();
            return Vec::new();
        };

        let mut updates = Vec::new();
        let video = frame.orientation.video();
        if self.video != Some(video) {
            log::debug!("video orientation: {:?} -> {:?}", self.video, video);
            self.video = Some(video);
            updates.push(UiUpdate::VideoOrientation(video));
        }

        match self
            .compositor
            .compose(&image, frame.orientation, self.crop.as_ref())
        {
            PreviewUpdate::Hold => {}
            preview => updates.push(UiUpdate::Preview(preview)),
        }

        if self.throttle.tick() {
            if let Some(detector) = &mut self.detector {
                let request = DetectRequest {
                    image: &image,
                    orientation: frame.orientation.exif(),
                    intrinsics: frame.intrinsics.as_ref(),
                };
                let result = self.t_detect.time(|| detector.detect(&request));
                let report = self.absorb(result, frame.orientation, image.resolution());
                updates.push(UiUpdate::Detections(report));
            }
        }

        self.fps.tick_with(
            self.compositor
                .timers()
                .chain(std::iter::once(&self.t_detect)),
        );
        updates
    }

    /// Applies the result of a detector run on a `frame`-sized image.
    ///
    /// This updates the crop rectangle and computes all overlay boxes in one step. Detector errors
    /// and malformed results are logged and treated like an empty result.
    pub fn absorb(
        &mut self,
        result: anyhow::Result<Vec<Detection>>,
        orientation: OrientationState,
        frame: Resolution,
    ) -> DetectionReport {
        let detections = match result.and_then(|dets| check_well_formed(&dets).map(|_| dets)) {
            Ok(dets) => dets,
            Err(e) => {
                log::warn!("discarding detector result: {e:#}");
                Vec::new()
            }
        };

        let candidates = self.filter.matching_label(detections);
        let oriented = orientation.frame_transform().output_resolution(frame);
        let view = self.view.unwrap_or(oriented);
        let fit = if self.aspect_fill {
            OverlayFit::AspectFill { frame: oriented }
        } else {
            OverlayFit::Stretch
        };

        let boxes = candidates
            .iter()
            .filter(|det| self.filter.is_confident(det))
            .map(|det| {
                let rect = overlay_rect(det.bounding_box(), view, orientation.facing, fit);
                (det.id().clone(), rect)
            })
            .collect::<Vec<_>>();

        let subject = self.selector.select(&candidates);
        self.crop = subject.map(|det| crop_rect(det.bounding_box(), oriented, orientation.facing));
        let subject = subject.map(|det| det.id().clone());

        log::trace!(
            "{} candidates, {} boxes, subject {:?}, crop {:?}",
            candidates.len(),
            boxes.len(),
            subject,
            self.crop
        );

        DetectionReport {
            view,
            boxes,
            count: candidates.len(),
            subject,
        }
    }

    /// Moves the dispatcher to a background worker thread.
    ///
    /// Frames sent to the returned worker are processed one at a time; sending blocks while the
    /// previous frame is still being processed. Resulting updates are sent to `ui`.
    pub fn spawn(mut self, ui: Sender<UiUpdate>) -> io::Result<Worker<FrameEvent>> {
        Worker::builder()
            .name("frame dispatcher")
            .spawn(move |event: FrameEvent| {
                for update in self.process(event) {
                    if ui.send(update).is_err() {
                        log::debug!("UI receiver is gone, dropping update");
                        return;
                    }
                }
            })
    }
}

/// Applies [`UiUpdate`]s to the overlay registry and a [`DisplaySink`].
///
/// This type is not [`Send`]: it is locked to the thread that created it, which is supposed to be
/// the UI thread.
pub struct Presenter<S: DisplaySink> {
    sink: S,
    registry: OverlayRegistry,
    count: usize,
    show_preview: bool,
    _lock: PhantomData<*const ()>,
}

impl<S: DisplaySink> Presenter<S> {
    pub fn new(sink: S, view: Resolution, padding: Padding) -> Self {
        let mut registry = OverlayRegistry::new(view);
        registry.set_padding(padding);
        Self {
            sink,
            registry,
            count: 0,
            show_preview: true,
            _lock: PhantomData,
        }
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    /// Returns the object count of the last detector run.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Shows or hides the subject preview. Returns whether it is now shown.
    pub fn toggle_preview(&mut self) -> anyhow::Result<bool> {
        self.show_preview = !self.show_preview;
        if !self.show_preview {
            self.sink.clear_preview()?;
        }
        Ok(self.show_preview)
    }

    pub fn apply(&mut self, update: UiUpdate) -> anyhow::Result<()> {
        match update {
            UiUpdate::VideoOrientation(orientation) => {
                self.sink.set_video_orientation(orientation)?
            }
            UiUpdate::Preview(PreviewUpdate::Show(image)) => {
                if self.show_preview {
                    self.sink.show_preview(&image)?;
                }
            }
            UiUpdate::Preview(PreviewUpdate::Clear) => self.sink.clear_preview()?,
            UiUpdate::Preview(PreviewUpdate::Hold) => {}
            UiUpdate::Detections(report) => {
                self.registry.set_bounds(report.view);
                self.registry.sync(report.boxes);
                self.count = report.count;
                self.sink
                    .render_overlays(&self.registry.snapshot(), self.count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::orientation::{CameraFacing, DeviceOrientation};

    use super::*;

    #[test]
    fn throttle_runs_on_frame_61() {
        let mut throttle = Throttle::new(60);
        let runs = (1..=61)
            .filter(|_| throttle.tick())
            .collect::<Vec<_>>();
        assert_eq!(runs, [61]);
        assert_eq!(throttle.count(), 0);

        let runs = (1..=122).filter(|_| throttle.tick()).count();
        assert_eq!(runs, 2);
    }

    #[test]
    fn throttle_resets_when_due() {
        let mut throttle = Throttle::new(1);
        assert!(!throttle.tick());
        assert!(throttle.tick());
        assert_eq!(throttle.count(), 0);
        assert!(!throttle.tick());
        assert_eq!(throttle.count(), 1);
    }

    #[test]
    fn throttle_skip_defers() {
        let mut throttle = Throttle::new(2);
        assert!(!throttle.tick());
        assert!(!throttle.tick());
        throttle.skip();
        assert_eq!(throttle.count(), 3);
        assert!(throttle.tick());
    }

    fn det(id: &str, y: f32, confidence: f32, label: &str) -> Detection {
        Detection::new(id, Rect::from_top_left(0.25, y, 0.5, 0.25), confidence, label)
    }

    fn landscape_front() -> OrientationState {
        OrientationState::new(DeviceOrientation::LandscapeLeft, CameraFacing::Front)
    }

    #[test]
    fn absorb_filters() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new());
        let report = dispatcher.absorb(
            Ok(vec![
                det("a", 0.0, 0.9, "person"),
                det("b", 0.5, 0.4, "person"),
                det("c", 0.5, 0.99, "dog"),
            ]),
            landscape_front(),
            Resolution::new(200, 100),
        );

        assert_eq!(report.count, 2);
        assert_eq!(report.view, Resolution::new(200, 100));
        assert_eq!(
            report.boxes,
            [(
                DetectionId::from("a"),
                Rect::from_top_left(50.0, 0.0, 100.0, 25.0)
            )]
        );
        assert_eq!(report.subject, Some(DetectionId::from("a")));
        assert_eq!(
            dispatcher.crop(),
            Some(&Rect::from_top_left(50.0, 0.0, 100.0, 25.0))
        );
    }

    #[test]
    fn boxes_and_crop_cover_the_same_region() {
        let res = Resolution::new(200, 100);
        for facing in [CameraFacing::Front, CameraFacing::Back] {
            let mut dispatcher = FrameDispatcher::new(None, &Options::new());
            let state = OrientationState::new(DeviceOrientation::LandscapeLeft, facing);
            let report = dispatcher.absorb(Ok(vec![det("a", 0.0, 0.9, "person")]), state, res);
            assert_eq!(Some(&report.boxes[0].1), dispatcher.crop(), "{facing:?}");
        }
    }

    #[test]
    fn low_confidence_subject_still_crops() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new());
        let report = dispatcher.absorb(
            Ok(vec![det("a", 0.0, 0.3, "person")]),
            landscape_front(),
            Resolution::new(200, 100),
        );
        assert!(report.boxes.is_empty());
        assert_eq!(report.count, 1);
        assert!(dispatcher.crop().is_some());
    }

    #[test]
    fn empty_result_clears_crop() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new());
        let res = Resolution::new(200, 100);
        dispatcher.absorb(Ok(vec![det("a", 0.0, 0.9, "person")]), landscape_front(), res);
        assert!(dispatcher.crop().is_some());

        let report = dispatcher.absorb(
            Ok(vec![det("z", 0.0, 0.9, "cat")]),
            landscape_front(),
            res,
        );
        assert!(report.boxes.is_empty());
        assert_eq!(report.count, 0);
        assert_eq!(report.subject, None);
        assert!(dispatcher.crop().is_none());
    }

    #[test]
    fn errors_behave_like_empty() {
        let res = Resolution::new(200, 100);
        let malformed = vec![
            det("a", 0.0, 0.9, "person"),
            Detection::new("b", Rect::from_top_left(0.0, 0.0, f32::NAN, 0.1), 0.9, "person"),
        ];

        let mut reference = FrameDispatcher::new(None, &Options::new());
        reference.absorb(Ok(vec![det("a", 0.0, 0.9, "person")]), landscape_front(), res);
        let empty = reference.absorb(Ok(Vec::new()), landscape_front(), res);

        for result in [Err(anyhow!("model crashed")), Ok(malformed)] {
            let mut dispatcher = FrameDispatcher::new(None, &Options::new());
            dispatcher.absorb(Ok(vec![det("a", 0.0, 0.9, "person")]), landscape_front(), res);
            let report = dispatcher.absorb(result, landscape_front(), res);
            assert_eq!(report, empty);
            assert!(dispatcher.crop().is_none());
        }
    }

    #[test]
    fn crop_uses_oriented_resolution() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new());
        let portrait = OrientationState::new(DeviceOrientation::Portrait, CameraFacing::Back);
        let report = dispatcher.absorb(
            Ok(vec![Detection::new(
                "a",
                Rect::from_top_left(0.0, 0.5, 0.5, 0.5),
                0.9,
                "person",
            )]),
            portrait,
            Resolution::new(200, 100),
        );
        assert_eq!(report.view, Resolution::new(100, 200));
        assert_eq!(
            dispatcher.crop(),
            Some(&Rect::from_top_left(0.0, 0.0, 50.0, 100.0))
        );
    }

    #[test]
    fn video_orientation_sent_on_change() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new());
        let frame = |device| {
            let mut image = Image::new(4, 2);
            image.clear(crate::image::Color::WHITE);
            FrameEvent::Frame(Frame {
                image: Some(image),
                orientation: OrientationState::new(device, CameraFacing::Back),
                intrinsics: None,
            })
        };
        let videos = |updates: Vec<UiUpdate>| {
            updates
                .into_iter()
                .filter_map(|u| match u {
                    UiUpdate::VideoOrientation(v) => Some(v),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(
            videos(dispatcher.process(frame(DeviceOrientation::Portrait))),
            [VideoOrientation::Portrait]
        );
        assert!(videos(dispatcher.process(frame(DeviceOrientation::Portrait))).is_empty());
        assert_eq!(
            videos(dispatcher.process(frame(DeviceOrientation::LandscapeLeft))),
            [VideoOrientation::LandscapeRight]
        );
        // Flat orientations render the preview upright.
        assert_eq!(
            videos(dispatcher.process(frame(DeviceOrientation::FaceUp))),
            [VideoOrientation::Portrait]
        );
    }

    #[test]
    fn missing_buffers_only_advance_throttle() {
        let mut dispatcher = FrameDispatcher::new(None, &Options::new().detect_interval(5));
        assert!(dispatcher.process(FrameEvent::Dropped).is_empty());
        assert!(dispatcher
            .process(FrameEvent::Frame(Frame {
                image: None,
                orientation: landscape_front(),
                intrinsics: None,
            }))
            .is_empty());
        assert_eq!(dispatcher.throttle().count(), 2);
    }
}
