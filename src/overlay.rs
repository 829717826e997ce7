//! Tracking boxes drawn on top of the live preview.
//!
//! The [`OverlayRegistry`] holds at most one [`OverlayBox`] per [`DetectionId`]. Detections that
//! keep their identifier across frames update their existing box in place; identifiers that
//! disappear from the detector output lose their box.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use itertools::Itertools;

use crate::{detection::DetectionId, image::Color, rect::Rect, resolution::Resolution};

/// Visual style of a tracking box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStyle {
    pub stroke: Color,
    pub line_width: u32,
    pub shadow_opacity: f32,
    pub shadow_radius: f32,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            stroke: Color::RED,
            line_width: 1,
            shadow_opacity: 0.7,
            shadow_radius: 5.0,
        }
    }
}

/// Inset added around every tracking box, in view pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub horizontal: f32,
    pub vertical: f32,
}

impl Padding {
    pub const ZERO: Self = Self {
        horizontal: 0.0,
        vertical: 0.0,
    };

    pub fn new(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Grows `rect` by the padding, then clips it to `bounds`.
    ///
    /// The result never extends past `bounds`. Rectangles with non-finite coordinates turn into
    /// an empty rectangle in the corner of `bounds`.
    pub fn apply(&self, rect: &Rect, bounds: &Rect) -> Rect {
        rect.grow(self.horizontal, self.vertical).clip_to(bounds)
    }
}

/// A tracking box layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    id: DetectionId,
    frame: Rect,
    source: Rect,
    path: Rect,
    style: BoxStyle,
}

impl OverlayBox {
    pub fn id(&self) -> &DetectionId {
        &self.id
    }

    /// Returns the layer's frame. It covers the whole overlay view, centered on it.
    pub fn frame(&self) -> &Rect {
        &self.frame
    }

    /// Returns the unpadded rectangle this box was last updated with.
    pub fn source(&self) -> &Rect {
        &self.source
    }

    /// Returns the rectangle that is stroked: the source, padded and clipped to the view.
    pub fn path(&self) -> &Rect {
        &self.path
    }

    pub fn style(&self) -> &BoxStyle {
        &self.style
    }
}

/// Outcome of [`OverlayRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

/// Counts of the changes made by [`OverlayRegistry::sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Identifier-keyed set of tracking boxes.
#[derive(Debug)]
pub struct OverlayRegistry {
    boxes: HashMap<DetectionId, OverlayBox>,
    bounds: Resolution,
    padding: Padding,
    style: BoxStyle,
}

impl OverlayRegistry {
    /// Creates an empty registry for an overlay view of size `bounds`.
    pub fn new(bounds: Resolution) -> Self {
        Self {
            boxes: HashMap::new(),
            bounds,
            padding: Padding::ZERO,
            style: BoxStyle::default(),
        }
    }

    pub fn bounds(&self) -> Resolution {
        self.bounds
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Updates the overlay view size and recomputes every box.
    pub fn set_bounds(&mut self, bounds: Resolution) {
        if bounds == self.bounds {
            return;
        }
        log::debug!("overlay bounds {} -> {}", self.bounds, bounds);
        self.bounds = bounds;
        self.relayout();
    }

    /// Changes the padding and recomputes every box.
    pub fn set_padding(&mut self, padding: Padding) {
        self.padding = padding;
        self.relayout();
    }

    fn relayout(&mut self) {
        let view = self.bounds.rect();
        for overlay in self.boxes.values_mut() {
            overlay.frame = view;
            overlay.path = self.padding.apply(&overlay.source, &view);
        }
    }

    /// Inserts a box for `id`, or moves the existing one.
    ///
    /// An existing box has its path replaced in one step; there is no intermediate state a
    /// renderer could observe.
    pub fn upsert(&mut self, id: DetectionId, rect: Rect) -> Upsert {
        let view = self.bounds.rect();
        let path = self.padding.apply(&rect, &view);
        match self.boxes.entry(id) {
            Entry::Occupied(mut entry) => {
                let overlay = entry.get_mut();
                overlay.source = rect;
                overlay.path = path;
                Upsert::Updated
            }
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                entry.insert(OverlayBox {
                    id,
                    frame: view,
                    source: rect,
                    path,
                    style: self.style,
                });
                Upsert::Created
            }
        }
    }

    pub fn remove(&mut self, id: &DetectionId) -> Option<OverlayBox> {
        self.boxes.remove(id)
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Makes the registry contain exactly the boxes in `rects`.
    ///
    /// Has the same visible effect as [`clear`](Self::clear) followed by an
    /// [`upsert`](Self::upsert) of every entry, but keeps boxes whose identifier survives.
    /// Duplicate identifiers in `rects` resolve to the last occurrence.
    pub fn sync<I>(&mut self, rects: I) -> SyncStats
    where
        I: IntoIterator<Item = (DetectionId, Rect)>,
    {
        let mut stats = SyncStats::default();
        let mut seen = HashSet::new();
        for (id, rect) in rects {
            seen.insert(id.clone());
            match self.upsert(id, rect) {
                Upsert::Created => stats.created += 1,
                Upsert::Updated => stats.updated += 1,
            }
        }

        let before = self.boxes.len();
        self.boxes.retain(|id, _| seen.contains(id));
        stats.removed = before - self.boxes.len();

        log::trace!("overlay sync: {:?}", stats);
        stats
    }

    pub fn get(&self, id: &DetectionId) -> Option<&OverlayBox> {
        self.boxes.get(id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns an iterator over all boxes, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayBox> {
        self.boxes.values()
    }

    /// Returns a copy of all boxes, sorted by identifier.
    pub fn snapshot(&self) -> Vec<OverlayBox> {
        self.boxes
            .values()
            .cloned()
            .sorted_by(|a, b| a.id.cmp(&b.id))
            .collect()
    }
}
