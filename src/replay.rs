//! A [`Detector`] that replays recorded detections.
//!
//! Recordings are JSON files containing one array of detections per frame the detector was run
//! on:
//!
//! ```json
//! [
//!   [{ "id": "1", "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.5, "confidence": 0.9, "label": "person" }],
//!   []
//! ]
//! ```
//!
//! Coordinates are normalized with the origin in the bottom-left corner, exactly as a live
//! detector reports them. Once the recording is exhausted, the replay detector reports no
//! detections.

use std::{collections::VecDeque, fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::{
    detection::{DetectRequest, Detection, Detector},
    rect::Rect,
};

#[derive(Debug, Deserialize)]
struct Record {
    id: String,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
    #[serde(default = "default_label")]
    label: String,
}

fn default_label() -> String {
    "person".into()
}

impl From<Record> for Detection {
    fn from(r: Record) -> Self {
        Detection::new(
            r.id,
            Rect::from_top_left(r.x, r.y, r.width, r.height),
            r.confidence,
            r.label,
        )
    }
}

/// Replays a recording of detector results, one entry per detector invocation.
#[derive(Debug)]
pub struct ReplayDetector {
    frames: VecDeque<Vec<Detection>>,
}

impl ReplayDetector {
    /// Loads a recording from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from '{}'", path.display()))?;
        let this = Self::from_json(&json)
            .with_context(|| format!("failed to parse detections in '{}'", path.display()))?;
        log::info!(
            "loaded {} recorded detector results from '{}'",
            this.frames.len(),
            path.display()
        );
        Ok(this)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let records: Vec<Vec<Record>> = serde_json::from_str(json)?;
        Ok(Self {
            frames: records
                .into_iter()
                .map(|frame| frame.into_iter().map(Detection::from).collect())
                .collect(),
        })
    }

    /// Returns the number of detector results left to replay.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _request: &DetectRequest<'_>) -> anyhow::Result<Vec<Detection>> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use crate::{image::Image, orientation::ExifOrientation};

    use super::*;

    #[test]
    fn replays_in_order() {
        let mut detector = ReplayDetector::from_json(
            r#"[
                [{"id": "7", "x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4, "confidence": 0.9}],
                [{"id": "7", "x": 0.2, "y": 0.2, "width": 0.3, "height": 0.4, "confidence": 0.8, "label": "dog"}]
            ]"#,
        )
        .unwrap();
        assert_eq!(detector.remaining(), 2);

        let image = Image::new(4, 4);
        let request = DetectRequest {
            image: &image,
            orientation: ExifOrientation::LeftMirrored,
            intrinsics: None,
        };
        let first = detector.detect(&request).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id().as_str(), "7");
        assert_eq!(first[0].label(), "person");
        assert_eq!(
            *first[0].bounding_box(),
            Rect::from_top_left(0.1, 0.2, 0.3, 0.4)
        );

        assert_eq!(detector.detect(&request).unwrap()[0].label(), "dog");
        assert!(detector.detect(&request).unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(ReplayDetector::from_json("{").is_err());
        assert!(ReplayDetector::from_json(r#"[[{"id": "1"}]]"#).is_err());
    }
}
