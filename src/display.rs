//! Display output.
//!
//! A [`DisplaySink`] is where the [`Presenter`](crate::dispatch::Presenter) puts the subject
//! preview and the tracking boxes. [`ImageDirSink`] renders both into PNG files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    image::{draw, Color, Image},
    orientation::VideoOrientation,
    overlay::OverlayBox,
    resolution::Resolution,
};

/// Receiver of everything that becomes visible.
pub trait DisplaySink {
    /// Sets the orientation the live camera preview is rendered in.
    fn set_video_orientation(&mut self, orientation: VideoOrientation) -> anyhow::Result<()>;

    /// Replaces the subject preview with `image`.
    fn show_preview(&mut self, image: &Image) -> anyhow::Result<()>;

    /// Removes the subject preview.
    fn clear_preview(&mut self) -> anyhow::Result<()>;

    /// Replaces the displayed tracking boxes and the object count.
    fn render_overlays(&mut self, boxes: &[OverlayBox], count: usize) -> anyhow::Result<()>;
}

/// Formats the object count label shown next to the tracking boxes.
pub fn count_label(count: usize) -> String {
    format!("Object count: {count}")
}

/// Draws tracking boxes and the object count onto `target`.
pub fn draw_overlays(target: &mut Image, boxes: &[OverlayBox], count: usize) {
    for overlay in boxes {
        let style = overlay.style();
        draw::rect(target, *overlay.path())
            .color(style.stroke)
            .stroke_width(style.line_width);
    }

    let label = count_label(count);
    draw::text(target, 4, 4, &label)
        .align_left()
        .align_top()
        .color(Color::WHITE);
}

/// A [`DisplaySink`] writing numbered PNG files to a directory.
///
/// Previews are written as `preview-NNNNN.png`, overlay renders as `overlay-NNNNN.png`. Overlays
/// are drawn onto a black `view`-sized canvas.
pub struct ImageDirSink {
    dir: PathBuf,
    view: Resolution,
    previews: usize,
    overlays: usize,
    preview_shown: bool,
    video: VideoOrientation,
}

impl ImageDirSink {
    /// Creates a sink writing to `dir`, creating the directory if necessary.
    pub fn new<P: AsRef<Path>>(dir: P, view: Resolution) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        Ok(Self {
            dir,
            view,
            previews: 0,
            overlays: 0,
            preview_shown: false,
            video: VideoOrientation::Portrait,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the number of preview images written so far.
    pub fn previews_written(&self) -> usize {
        self.previews
    }

    /// Returns the number of overlay renders written so far.
    pub fn overlays_written(&self) -> usize {
        self.overlays
    }

    /// Returns whether a preview is currently shown (ie. it was not cleared since).
    pub fn is_preview_shown(&self) -> bool {
        self.preview_shown
    }

    pub fn video_orientation(&self) -> VideoOrientation {
        self.video
    }
}

impl DisplaySink for ImageDirSink {
    fn set_video_orientation(&mut self, orientation: VideoOrientation) -> anyhow::Result<()> {
        if orientation != self.video {
            log::info!("live preview orientation: {:?}", orientation);
        }
        self.video = orientation;
        Ok(())
    }

    fn show_preview(&mut self, image: &Image) -> anyhow::Result<()> {
        let path = self.dir.join(format!("preview-{:05}.png", self.previews));
        image.save(&path)?;
        self.previews += 1;
        self.preview_shown = true;
        Ok(())
    }

    fn clear_preview(&mut self) -> anyhow::Result<()> {
        if self.preview_shown {
            log::debug!("preview cleared after {} images", self.previews);
        }
        self.preview_shown = false;
        Ok(())
    }

    fn render_overlays(&mut self, boxes: &[OverlayBox], count: usize) -> anyhow::Result<()> {
        let view = boxes
            .first()
            .map(|overlay| {
                let frame = overlay.frame();
                Resolution::new(frame.width() as u32, frame.height() as u32)
            })
            .unwrap_or(self.view);

        let mut canvas = Image::new(view.width(), view.height());
        canvas.clear(Color::BLACK);
        draw_overlays(&mut canvas, boxes, count);

        let path = self.dir.join(format!("overlay-{:05}.png", self.overlays));
        canvas.save(&path)?;
        self.overlays += 1;
        Ok(())
    }
}
