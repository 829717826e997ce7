//! Pipeline options.
//!
//! [`Options`] can be built in code, or created with overrides from the environment with
//! [`Options::from_env`] (see the crate docs for the recognized variables).

use std::env::{self, VarError};

use anyhow::{anyhow, bail, Context};

use crate::{
    detection::DetectionFilter,
    orientation::{CameraFacing, DeviceOrientation, OrientationState},
    overlay::Padding,
    preview::PreviewPolicy,
    resolution::Resolution,
};

/// Default number of frames between two detector runs.
pub const DEFAULT_DETECT_INTERVAL: u32 = 60;

/// Tunables of the frame processing pipeline.
#[derive(Debug, Clone)]
pub struct Options {
    detect_interval: u32,
    filter: DetectionFilter,
    padding: Padding,
    preview_policy: PreviewPolicy,
    aspect_fill: bool,
    view: Option<Resolution>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            detect_interval: DEFAULT_DETECT_INTERVAL,
            filter: DetectionFilter::default(),
            padding: Padding::ZERO,
            preview_policy: PreviewPolicy::default(),
            aspect_fill: false,
            view: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of frames to let pass between two detector runs.
    pub fn detect_interval(mut self, frames: u32) -> Self {
        self.detect_interval = frames;
        self
    }

    /// Sets the label detections need to have to be counted and tracked.
    pub fn label<L: Into<String>>(mut self, label: L) -> Self {
        self.filter = DetectionFilter::new(label, self.filter.confidence_threshold());
        self
    }

    /// Sets the confidence a detection needs to exceed to get a tracking box.
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.filter = DetectionFilter::new(self.filter.label(), threshold);
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn preview_policy(mut self, policy: PreviewPolicy) -> Self {
        self.preview_policy = policy;
        self
    }

    /// Whether the live preview is displayed aspect-filled (scaled to cover the overlay view,
    /// centered) rather than stretched.
    pub fn aspect_fill(mut self, aspect_fill: bool) -> Self {
        self.aspect_fill = aspect_fill;
        self
    }

    /// Sets the size of the overlay view.
    ///
    /// By default, the overlay view has the size of the upright camera frame.
    pub fn view(mut self, view: Resolution) -> Self {
        self.view = Some(view);
        self
    }

    pub fn get_detect_interval(&self) -> u32 {
        self.detect_interval
    }

    pub fn get_filter(&self) -> &DetectionFilter {
        &self.filter
    }

    pub fn get_padding(&self) -> Padding {
        self.padding
    }

    pub fn get_preview_policy(&self) -> PreviewPolicy {
        self.preview_policy
    }

    pub fn get_aspect_fill(&self) -> bool {
        self.aspect_fill
    }

    pub fn get_view(&self) -> Option<Resolution> {
        self.view
    }

    /// Creates the default options, with overrides from the `HUDET_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().override_with(|name| env::var(name))
    }

    fn override_with<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let var = |name: &str| -> anyhow::Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(s)) => Err(anyhow!(
                    "invalid value set for `{name}` variable: {}",
                    s.to_string_lossy()
                )),
            }
        };

        if let Some(v) = var("HUDET_DETECT_INTERVAL")? {
            self = self.detect_interval(
                v.parse()
                    .with_context(|| format!("invalid `HUDET_DETECT_INTERVAL` value '{v}'"))?,
            );
        }
        if let Some(v) = var("HUDET_CONFIDENCE")? {
            let threshold: f32 = v
                .parse()
                .with_context(|| format!("invalid `HUDET_CONFIDENCE` value '{v}'"))?;
            if !(0.0..=1.0).contains(&threshold) {
                bail!("`HUDET_CONFIDENCE` must be between 0 and 1, got {threshold}");
            }
            self = self.confidence_threshold(threshold);
        }
        if let Some(v) = var("HUDET_LABEL")? {
            self = self.label(v);
        }
        if let Some(v) = var("HUDET_PADDING")? {
            self = self.padding(parse_padding(&v)?);
        }
        if let Some(v) = var("HUDET_PREVIEW")? {
            self = self.preview_policy(
                PreviewPolicy::from_name(&v)
                    .ok_or_else(|| anyhow!("invalid `HUDET_PREVIEW` value '{v}'"))?,
            );
        }
        if let Some(v) = var("HUDET_OVERLAY_FIT")? {
            self = self.aspect_fill(match v.as_str() {
                "stretch" => false,
                "fill" => true,
                _ => bail!("invalid `HUDET_OVERLAY_FIT` value '{v}'"),
            });
        }

        log::debug!("options: {:?}", self);
        Ok(self)
    }
}

/// Parses a padding of the form `h,v` (or a single number used for both).
fn parse_padding(s: &str) -> anyhow::Result<Padding> {
    let parse = |part: &str| -> anyhow::Result<f32> {
        let value: f32 = part
            .trim()
            .parse()
            .with_context(|| format!("invalid `HUDET_PADDING` value '{s}'"))?;
        if !value.is_finite() || value < 0.0 {
            bail!("`HUDET_PADDING` must be non-negative, got '{s}'");
        }
        Ok(value)
    };

    match s.split_once(',') {
        Some((h, v)) => Ok(Padding::new(parse(h)?, parse(v)?)),
        None => {
            let both = parse(s)?;
            Ok(Padding::new(both, both))
        }
    }
}

/// Reads the initial orientation from `HUDET_ORIENTATION` and `HUDET_FACING`.
///
/// Unset variables leave the corresponding part of `default` unchanged.
pub fn orientation_from_env(default: OrientationState) -> anyhow::Result<OrientationState> {
    let mut state = default;
    match env::var("HUDET_ORIENTATION") {
        Ok(v) => {
            state.device = DeviceOrientation::from_name(&v)
                .ok_or_else(|| anyhow!("invalid `HUDET_ORIENTATION` value '{v}'"))?;
        }
        Err(VarError::NotPresent) => {}
        Err(e) => return Err(e).context("invalid `HUDET_ORIENTATION` value"),
    }
    match env::var("HUDET_FACING") {
        Ok(v) => {
            state.facing = CameraFacing::from_name(&v)
                .ok_or_else(|| anyhow!("invalid `HUDET_FACING` value '{v}'"))?;
        }
        Err(VarError::NotPresent) => {}
        Err(e) => return Err(e).context("invalid `HUDET_FACING` value"),
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn with_vars(vars: &[(&str, &str)]) -> anyhow::Result<Options> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Options::new().override_with(|name| vars.get(name).cloned().ok_or(VarError::NotPresent))
    }

    #[test]
    fn defaults() {
        let options = with_vars(&[]).unwrap();
        assert_eq!(options.get_detect_interval(), 60);
        assert_eq!(options.get_filter().label(), "person");
        assert_eq!(options.get_filter().confidence_threshold(), 0.5);
        assert_eq!(options.get_padding(), Padding::ZERO);
        assert_eq!(options.get_preview_policy(), PreviewPolicy::FullFrame);
        assert!(!options.get_aspect_fill());
    }

    #[test]
    fn overrides() {
        let options = with_vars(&[
            ("HUDET_DETECT_INTERVAL", "10"),
            ("HUDET_CONFIDENCE", "0.8"),
            ("HUDET_LABEL", "cat"),
            ("HUDET_PADDING", "4, 2"),
            ("HUDET_PREVIEW", "clear"),
            ("HUDET_OVERLAY_FIT", "fill"),
        ])
        .unwrap();
        assert_eq!(options.get_detect_interval(), 10);
        assert_eq!(options.get_filter().label(), "cat");
        assert_eq!(options.get_filter().confidence_threshold(), 0.8);
        assert_eq!(options.get_padding(), Padding::new(4.0, 2.0));
        assert_eq!(options.get_preview_policy(), PreviewPolicy::Clear);
        assert!(options.get_aspect_fill());

        assert_eq!(
            with_vars(&[("HUDET_PADDING", "3")]).unwrap().get_padding(),
            Padding::new(3.0, 3.0)
        );
    }

    #[test]
    fn invalid_values() {
        assert!(with_vars(&[("HUDET_DETECT_INTERVAL", "-1")]).is_err());
        assert!(with_vars(&[("HUDET_CONFIDENCE", "2")]).is_err());
        assert!(with_vars(&[("HUDET_PADDING", "1,x")]).is_err());
        assert!(with_vars(&[("HUDET_PADDING", "-1")]).is_err());
        assert!(with_vars(&[("HUDET_PREVIEW", "sometimes")]).is_err());
        assert!(with_vars(&[("HUDET_OVERLAY_FIT", "zoom")]).is_err());
    }
}
