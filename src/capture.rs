//! Camera capture and session control.
//!
//! A [`CaptureSource`] delivers raw camera frames. The [`Session`] wraps a source, handles
//! start/stop and camera flipping, and turns captured frames into [`FrameEvent`]s that carry the
//! orientation snapshot they were captured with.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use nalgebra::Matrix3;

use crate::{
    dispatch::{Frame, FrameEvent},
    image::{self, Image},
    orientation::{CameraFacing, SharedOrientation},
    resolution::Resolution,
    timer::Timer,
};

/// Output of [`CaptureSource::next`].
#[derive(Debug, Clone)]
pub enum Captured {
    /// A frame was captured. The pixel buffer can still be missing.
    Frame {
        image: Option<Image>,
        intrinsics: Option<Matrix3<f32>>,
    },
    /// The device dropped a frame.
    Dropped,
}

/// A source of camera frames.
pub trait CaptureSource {
    /// Returns the resolution of the raw frames.
    fn resolution(&self) -> Resolution;

    /// Returns the facing of the active camera.
    fn facing(&self) -> CameraFacing;

    /// Returns the facings of all cameras that can be selected.
    fn facings(&self) -> &[CameraFacing];

    /// Switches to the camera with the given facing.
    fn select_facing(&mut self, facing: CameraFacing) -> anyhow::Result<()>;

    /// Captures the next frame. Returns [`None`] when the source is exhausted.
    fn next(&mut self) -> Option<Captured>;
}

/// A [`CaptureSource`] replaying a directory of PNG and JPEG files in file name order.
///
/// Files that fail to load, or whose resolution differs from the first decodable file, are
/// delivered as frames without pixel buffer. Opening fails only if no file decodes at all.
pub struct FrameSequence {
    paths: Vec<PathBuf>,
    next: usize,
    resolution: Resolution,
    facings: Vec<CameraFacing>,
    facing: CameraFacing,
    t_load: Timer,
}

impl FrameSequence {
    /// Opens a directory of frames recorded with a camera of the given facing.
    pub fn open<P: AsRef<Path>>(dir: P, facing: CameraFacing) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut paths = fs::read_dir(dir)
            .with_context(|| format!("failed to read frame directory '{}'", dir.display()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()?;
        paths.retain(|path| path.is_file() && image::is_supported_path(path));
        paths.sort();

        if paths.is_empty() {
            bail!("no PNG or JPEG files found in '{}'", dir.display());
        }
        // The first decodable file determines the resolution of the recording.
        let Some(resolution) = paths.iter().find_map(|path| match Image::load(path) {
            Ok(image) => Some(image.resolution()),
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        }) else {
            bail!("none of the frames in '{}' could be decoded", dir.display());
        };
        log::info!(
            "replaying {} frames of {} from '{}'",
            paths.len(),
            resolution,
            dir.display()
        );

        Ok(Self {
            paths,
            next: 0,
            resolution,
            facings: vec![facing],
            facing,
            t_load: Timer::new("load"),
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        std::iter::once(&self.t_load)
    }
}

impl CaptureSource for FrameSequence {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn facings(&self) -> &[CameraFacing] {
        &self.facings
    }

    fn select_facing(&mut self, facing: CameraFacing) -> anyhow::Result<()> {
        if !self.facings.contains(&facing) {
            bail!("no {:?} camera in this recording", facing);
        }
        self.facing = facing;
        Ok(())
    }

    fn next(&mut self) -> Option<Captured> {
        let path = self.paths.get(self.next)?;
        self.next += 1;

        let image = match self.t_load.time(|| Image::load(path)) {
            Ok(image) if image.resolution() == self.resolution => Some(image),
            Ok(image) => {
                log::warn!(
                    "'{}' is {}, expected {}; skipping",
                    path.display(),
                    image.resolution(),
                    self.resolution
                );
                None
            }
            Err(e) => {
                log::warn!("{e:#}");
                None
            }
        };
        Some(Captured::Frame {
            image,
            intrinsics: None,
        })
    }
}

/// A capture session: a [`CaptureSource`] plus running state and orientation tracking.
pub struct Session<C: CaptureSource> {
    source: C,
    orientation: SharedOrientation,
    running: bool,
}

impl<C: CaptureSource> Session<C> {
    /// Creates a running session.
    ///
    /// The facing stored in `orientation` is updated to the facing of `source`.
    pub fn new(source: C, orientation: SharedOrientation) -> Self {
        orientation.set_facing(source.facing());
        Self {
            source,
            orientation,
            running: true,
        }
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn orientation(&self) -> &SharedOrientation {
        &self.orientation
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts or stops the session. Returns whether it is now running.
    pub fn toggle(&mut self) -> bool {
        self.running = !self.running;
        log::info!(
            "capture session {}",
            if self.running { "started" } else { "stopped" }
        );
        self.running
    }

    /// Switches to the camera on the other side of the device.
    ///
    /// If there is no such camera, or switching fails, the current camera stays active. Returns
    /// the facing of the active camera.
    pub fn flip_camera(&mut self) -> CameraFacing {
        let current = self.source.facing();
        let target = current.flipped();
        if !self.source.facings().contains(&target) {
            log::warn!("cannot flip camera: no {:?} camera available", target);
            return current;
        }

        match self.source.select_facing(target) {
            Ok(()) => {
                self.orientation.set_facing(target);
                target
            }
            Err(e) => {
                log::warn!("failed to switch to {:?} camera: {e:#}", target);
                current
            }
        }
    }

    /// Captures the next frame, together with the current orientation.
    ///
    /// Returns [`None`] if the session is stopped or the source is exhausted.
    pub fn next_event(&mut self) -> Option<FrameEvent> {
        if !self.running {
            return None;
        }

        let event = match self.source.next()? {
            Captured::Frame { image, intrinsics } => FrameEvent::Frame(Frame {
                image,
                orientation: self.orientation.snapshot(),
                intrinsics,
            }),
            Captured::Dropped => FrameEvent::Dropped,
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use crate::orientation::{DeviceOrientation, OrientationState};

    use super::*;

    struct FakeCamera {
        facings: Vec<CameraFacing>,
        facing: CameraFacing,
        fail: bool,
        frames: usize,
    }

    impl CaptureSource for FakeCamera {
        fn resolution(&self) -> Resolution {
            Resolution::new(4, 2)
        }

        fn facing(&self) -> CameraFacing {
            self.facing
        }

        fn facings(&self) -> &[CameraFacing] {
            &self.facings
        }

        fn select_facing(&mut self, facing: CameraFacing) -> anyhow::Result<()> {
            if self.fail {
                bail!("device busy");
            }
            self.facing = facing;
            Ok(())
        }

        fn next(&mut self) -> Option<Captured> {
            self.frames = self.frames.checked_sub(1)?;
            if self.frames % 2 == 0 {
                Some(Captured::Dropped)
            } else {
                Some(Captured::Frame {
                    image: Some(Image::new(4, 2)),
                    intrinsics: None,
                })
            }
        }
    }

    fn camera(facings: &[CameraFacing], fail: bool) -> FakeCamera {
        FakeCamera {
            facings: facings.to_vec(),
            facing: CameraFacing::Front,
            fail,
            frames: 2,
        }
    }

    #[test]
    fn flip_camera() {
        let mut session = Session::new(
            camera(&[CameraFacing::Front, CameraFacing::Back], false),
            SharedOrientation::default(),
        );
        assert_eq!(session.flip_camera(), CameraFacing::Back);
        assert_eq!(session.orientation().snapshot().facing, CameraFacing::Back);
        assert_eq!(session.flip_camera(), CameraFacing::Front);
    }

    #[test]
    fn flip_camera_failures_keep_current() {
        let mut session = Session::new(
            camera(&[CameraFacing::Front], false),
            SharedOrientation::default(),
        );
        assert_eq!(session.flip_camera(), CameraFacing::Front);

        let mut session = Session::new(
            camera(&[CameraFacing::Front, CameraFacing::Back], true),
            SharedOrientation::default(),
        );
        assert_eq!(session.flip_camera(), CameraFacing::Front);
        assert_eq!(session.orientation().snapshot().facing, CameraFacing::Front);
    }

    #[test]
    fn events_carry_orientation() {
        let orientation = SharedOrientation::new(OrientationState::new(
            DeviceOrientation::Portrait,
            CameraFacing::Back,
        ));
        let mut session = Session::new(camera(&[CameraFacing::Front], false), orientation);

        match session.next_event() {
            Some(FrameEvent::Frame(frame)) => {
                assert!(frame.image.is_some());
                assert_eq!(
                    frame.orientation,
                    OrientationState::new(DeviceOrientation::Portrait, CameraFacing::Front)
                );
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(session.next_event(), Some(FrameEvent::Dropped)));
        assert!(session.next_event().is_none());
    }

    #[test]
    fn stopped_session_yields_nothing() {
        let mut session = Session::new(
            camera(&[CameraFacing::Front], false),
            SharedOrientation::default(),
        );
        assert!(!session.toggle());
        assert!(session.next_event().is_none());
        assert!(session.toggle());
        assert!(session.next_event().is_some());
    }

    #[test]
    fn unreadable_first_frame() {
        let dir = std::env::temp_dir().join(format!("hudet-frames-{}", fastrand::u64(..)));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0001.png"), b"truncated").unwrap();
        Image::new(6, 4).save(dir.join("0002.png")).unwrap();

        let mut frames = FrameSequence::open(&dir, CameraFacing::Back).unwrap();
        assert_eq!(frames.resolution(), Resolution::new(6, 4));
        assert!(matches!(
            frames.next(),
            Some(Captured::Frame { image: None, .. })
        ));
        assert!(matches!(
            frames.next(),
            Some(Captured::Frame { image: Some(_), .. })
        ));

        fs::write(dir.join("0002.png"), b"also truncated").unwrap();
        assert!(FrameSequence::open(&dir, CameraFacing::Back).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn frame_sequence() {
        let dir = std::env::temp_dir().join(format!("hudet-frames-{}", fastrand::u64(..)));
        fs::create_dir_all(&dir).unwrap();
        Image::new(6, 4).save(dir.join("0001.png")).unwrap();
        fs::write(dir.join("0002.png"), b"not a png").unwrap();
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut frames = FrameSequence::open(&dir, CameraFacing::Back).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.resolution(), Resolution::new(6, 4));
        assert!(frames.select_facing(CameraFacing::Front).is_err());

        assert!(matches!(
            frames.next(),
            Some(Captured::Frame { image: Some(_), .. })
        ));
        assert!(matches!(
            frames.next(),
            Some(Captured::Frame { image: None, .. })
        ));
        assert!(frames.next().is_none());

        fs::remove_dir_all(&dir).unwrap();
    }
}
