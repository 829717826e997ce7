//! Detection records and the contract with the (external) person detector.
//!
//! The detector itself is opaque: it receives an image and an orientation hint and returns a list
//! of [`Detection`]s with normalized, bottom-left-origin bounding boxes. This module also holds
//! the policies applied to its output: label/confidence filtering ([`DetectionFilter`]) and the
//! choice of the subject shown in the preview ([`SubjectSelector`]).

use std::{cmp::Reverse, fmt};

use anyhow::bail;
use nalgebra::Matrix3;

use crate::{image::Image, num::TotalF32, orientation::ExifOrientation, rect::Rect};

/// Identifies a tracked object across frames.
///
/// The detector assigns these; the same subject keeps its identifier for as long as it is being
/// tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DetectionId(String);

impl DetectionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DetectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DetectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for DetectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detected object.
///
/// The bounding box is in normalized coordinates (fractions of the image size) with the origin in
/// the bottom-left corner. Per convention, the confidence lies between 0.0 and 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    id: DetectionId,
    bounding_box: Rect,
    confidence: f32,
    label: String,
}

impl Detection {
    pub fn new<I: Into<DetectionId>, L: Into<String>>(
        id: I,
        bounding_box: Rect,
        confidence: f32,
        label: L,
    ) -> Self {
        Self {
            id: id.into(),
            bounding_box,
            confidence,
            label: label.into(),
        }
    }

    pub fn id(&self) -> &DetectionId {
        &self.id
    }

    /// Returns the normalized, bottom-left-origin bounding box.
    pub fn bounding_box(&self) -> &Rect {
        &self.bounding_box
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the top classification label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` if the bounding box has finite coordinates and non-negative size, and the
    /// confidence lies in `0.0..=1.0`.
    pub fn is_well_formed(&self) -> bool {
        self.bounding_box.is_valid() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Returns an error if any detection in `detections` is not [well-formed].
///
/// A single bad record makes the whole result untrustworthy, so it is rejected as a whole.
///
/// [well-formed]: Detection::is_well_formed
pub fn check_well_formed(detections: &[Detection]) -> anyhow::Result<()> {
    if let Some(bad) = detections.iter().find(|det| !det.is_well_formed()) {
        bail!(
            "malformed detection '{}': {:?}, confidence {}",
            bad.id,
            bad.bounding_box,
            bad.confidence
        );
    }
    Ok(())
}

/// Input passed to a [`Detector`].
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    /// The raw, unoriented camera frame.
    pub image: &'a Image,
    /// How the frame has to be rotated/mirrored to appear upright.
    pub orientation: ExifOrientation,
    /// Camera intrinsic matrix, if the capture device provides it.
    pub intrinsics: Option<&'a Matrix3<f32>>,
}

/// Trait implemented by person detectors.
///
/// Implementations run synchronously on the dispatcher's worker thread.
pub trait Detector: Send + 'static {
    /// Runs detection on a frame.
    ///
    /// Returned bounding boxes must be normalized, with the origin in the bottom-left corner of
    /// the upright image.
    fn detect(&mut self, request: &DetectRequest<'_>) -> anyhow::Result<Vec<Detection>>;
}

impl<F> Detector for F
where
    F: FnMut(&DetectRequest<'_>) -> anyhow::Result<Vec<Detection>> + Send + 'static,
{
    fn detect(&mut self, request: &DetectRequest<'_>) -> anyhow::Result<Vec<Detection>> {
        self(request)
    }
}

/// Label and confidence policy applied to detector output.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    label: String,
    confidence_threshold: f32,
}

impl DetectionFilter {
    pub const DEFAULT_LABEL: &'static str = "person";
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

    pub fn new<L: Into<String>>(label: L, confidence_threshold: f32) -> Self {
        Self {
            label: label.into(),
            confidence_threshold,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Keeps only the detections whose label matches.
    ///
    /// These are counted, and are the candidates for the subject preview.
    pub fn matching_label(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|det| det.label == self.label)
            .collect()
    }

    /// Returns `true` if `detection` is confident enough to get a tracking box.
    ///
    /// The threshold is exclusive.
    pub fn is_confident(&self, detection: &Detection) -> bool {
        detection.confidence > self.confidence_threshold
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LABEL, Self::DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Chooses the primary subject among the candidates of each detector run.
///
/// The previously selected subject is kept for as long as the detector still reports it, so the
/// preview does not jump between people. Otherwise the most confident candidate wins (the
/// earliest one, if several are equally confident).
#[derive(Debug, Default)]
pub struct SubjectSelector {
    current: Option<DetectionId>,
}

impl SubjectSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier of the currently selected subject.
    pub fn current(&self) -> Option<&DetectionId> {
        self.current.as_ref()
    }

    pub fn select<'a>(&mut self, candidates: &'a [Detection]) -> Option<&'a Detection> {
        let previous = self
            .current
            .as_ref()
            .and_then(|id| candidates.iter().find(|det| det.id == *id));
        let selected = previous.or_else(|| {
            candidates
                .iter()
                .min_by_key(|det| Reverse(TotalF32(det.confidence)))
        });

        let id = selected.map(|det| det.id.clone());
        if id != self.current {
            log::debug!("primary subject: {:?} -> {:?}", self.current, id);
        }
        self.current = id;
        selected
    }
}
