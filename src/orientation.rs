//! Device orientation, camera facing, and the transforms derived from them.
//!
//! All geometry in a frame-processing pass has to agree on a single orientation, so
//! [`OrientationState`] is a small `Copy` value that gets snapshotted once per frame (see
//! [`SharedOrientation::snapshot`]) and then passed explicitly to everything that needs it.

use std::sync::{Arc, Mutex};

use crate::affine::Affine;
use crate::image::Image;
use crate::rect::Rect;
use crate::resolution::Resolution;

/// Physical orientation of the device, as reported by its motion sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    /// Parses the names used in configuration (`portrait`, `portrait-upside-down`,
    /// `landscape-left`, `landscape-right`, `face-up`, `face-down`, `unknown`).
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "portrait" => Self::Portrait,
            "portrait-upside-down" => Self::PortraitUpsideDown,
            "landscape-left" => Self::LandscapeLeft,
            "landscape-right" => Self::LandscapeRight,
            "face-up" => Self::FaceUp,
            "face-down" => Self::FaceDown,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }
}

/// Which way the active camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraFacing {
    /// The selfie camera. Its image is mirrored relative to what the detector expects.
    #[default]
    Front,
    Back,
}

impl CameraFacing {
    /// Returns the camera on the other side of the device.
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "front" => Some(Self::Front),
            "back" => Some(Self::Back),
            _ => None,
        }
    }
}

/// EXIF orientation tag values (the numeric value is the tag value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExifOrientation {
    Up = 1,
    UpMirrored = 2,
    Down = 3,
    DownMirrored = 4,
    LeftMirrored = 5,
    Right = 6,
    RightMirrored = 7,
    Left = 8,
}

impl ExifOrientation {
    /// The orientation hint handed to the detector for a given device orientation.
    ///
    /// The hints are mirrored variants, because the sensor delivers frames of the front camera.
    pub fn for_device(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::PortraitUpsideDown => Self::RightMirrored,
            DeviceOrientation::LandscapeLeft => Self::DownMirrored,
            DeviceOrientation::LandscapeRight => Self::UpMirrored,
            _ => Self::LeftMirrored,
        }
    }
}

/// Orientation the live preview layer should render the video in.
///
/// Landscape orientations are swapped: the device's "landscape left" has the camera on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    pub fn for_device(orientation: DeviceOrientation) -> Self {
        match orientation {
            DeviceOrientation::LandscapeLeft => Self::LandscapeRight,
            DeviceOrientation::LandscapeRight => Self::LandscapeLeft,
            DeviceOrientation::PortraitUpsideDown => Self::PortraitUpsideDown,
            _ => Self::Portrait,
        }
    }
}

/// Snapshot of everything orientation-related that frame processing depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrientationState {
    pub device: DeviceOrientation,
    pub facing: CameraFacing,
}

impl OrientationState {
    pub fn new(device: DeviceOrientation, facing: CameraFacing) -> Self {
        Self { device, facing }
    }

    pub fn exif(&self) -> ExifOrientation {
        ExifOrientation::for_device(self.device)
    }

    pub fn video(&self) -> VideoOrientation {
        VideoOrientation::for_device(self.device)
    }

    pub fn frame_transform(&self) -> FrameTransform {
        FrameTransform::for_state(*self)
    }
}

/// Orientation state shared between the thread that observes device rotation / camera changes
/// and the frame-processing thread.
#[derive(Debug, Clone, Default)]
pub struct SharedOrientation {
    inner: Arc<Mutex<OrientationState>>,
}

impl SharedOrientation {
    pub fn new(state: OrientationState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_device(&self, device: DeviceOrientation) {
        let mut state = self.inner.lock().unwrap();
        if state.device != device {
            log::debug!("device orientation {:?} -> {:?}", state.device, device);
            state.device = device;
        }
    }

    pub fn set_facing(&self, facing: CameraFacing) {
        let mut state = self.inner.lock().unwrap();
        if state.facing != facing {
            log::debug!("camera facing {:?} -> {:?}", state.facing, facing);
            state.facing = facing;
        }
    }

    /// Returns the current state. Call this once per frame and pass the result along.
    pub fn snapshot(&self) -> OrientationState {
        *self.inner.lock().unwrap()
    }
}

/// A single step of a [`FrameTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientStep {
    /// Rotation by the given number of clockwise quarter turns.
    Rotate(u8),
    FlipHorizontal,
    FlipVertical,
}

impl OrientStep {
    /// The step's linear part, before re-anchoring.
    fn affine(self) -> Affine {
        match self {
            Self::Rotate(turns) => Affine::quarter_turns(i32::from(turns)),
            Self::FlipHorizontal => Affine::scale(-1.0, 1.0),
            Self::FlipVertical => Affine::scale(1.0, -1.0),
        }
    }

    fn apply_to_image(self, image: &Image) -> Image {
        match self {
            Self::Rotate(turns) => image.rotate_cw(turns),
            Self::FlipHorizontal => image.flip_horizontal(),
            Self::FlipVertical => image.flip_vertical(),
        }
    }
}

/// The sequence of rotations and flips that turns a raw sensor frame upright for display.
///
/// Rotation comes first, then mirroring. Every step moves the image's extent away from the origin,
/// so each one is followed by a translation that re-anchors the extent at `(0, 0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTransform {
    steps: Vec<OrientStep>,
}

impl FrameTransform {
    pub fn for_state(state: OrientationState) -> Self {
        let front = state.facing == CameraFacing::Front;
        let (turns, mirror) = match state.device {
            DeviceOrientation::Portrait => (1, OrientStep::FlipHorizontal),
            DeviceOrientation::PortraitUpsideDown => (3, OrientStep::FlipHorizontal),
            DeviceOrientation::LandscapeRight => (2, OrientStep::FlipVertical),
            DeviceOrientation::LandscapeLeft
            | DeviceOrientation::FaceUp
            | DeviceOrientation::FaceDown
            | DeviceOrientation::Unknown => (0, OrientStep::FlipVertical),
        };

        let mut steps = Vec::new();
        if turns != 0 {
            steps.push(OrientStep::Rotate(turns));
        }
        if front {
            steps.push(mirror);
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[OrientStep] {
        &self.steps
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the resolution of a `input`-sized frame after this transform.
    pub fn output_resolution(&self, input: Resolution) -> Resolution {
        let turns: u32 = self
            .steps
            .iter()
            .map(|step| match step {
                OrientStep::Rotate(turns) => u32::from(*turns),
                _ => 0,
            })
            .sum();
        if turns % 2 == 1 {
            input.transposed()
        } else {
            input
        }
    }

    /// Computes the affine transform mapping pixel coordinates in a raw `input`-sized frame to
    /// pixel coordinates in the transformed frame, re-anchoring after every step.
    pub fn affine(&self, input: Resolution) -> Affine {
        let mut affine = Affine::identity();
        let mut extent = input.rect();
        for step in &self.steps {
            let step = step.affine();
            extent = extent.transform(&step);
            let anchor = Affine::translation(-extent.x(), -extent.y());
            extent = extent.transform(&anchor);
            affine = affine.then(&step).then(&anchor);
        }
        affine
    }

    /// Maps a pixel rectangle from the raw frame into the transformed frame.
    pub fn map_rect(&self, rect: &Rect, input: Resolution) -> Rect {
        rect.transform(&self.affine(input))
    }

    /// Applies the transform to an image.
    ///
    /// The output is always anchored at `(0, 0)`, matching [`FrameTransform::affine`].
    pub fn apply(&self, image: &Image) -> Image {
        let mut steps = self.steps.iter();
        let Some(first) = steps.next() else {
            return image.clone();
        };
        let mut out = first.apply_to_image(image);
        for step in steps {
            out = step.apply_to_image(&out);
        }
        out
    }
}
