//! Command parameter types exposed by the CDP adapter interface.

use serde::{Deserialize, Serialize};

/// Viewport-relative point an input event is dispatched at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

/// Options for capturing screenshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreenshotOptions {
    /// Capture the whole scrollable document instead of the viewport.
    pub full_page: bool,
    pub format: ScreenshotFormat,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            full_page: true,
            format: ScreenshotFormat::Png,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ScreenshotFormat {
    Png,
    Jpeg { quality: Option<u8> },
}

impl ScreenshotFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "png",
            ScreenshotFormat::Jpeg { .. } => "jpeg",
        }
    }
}

/// Clip rectangle passed to `Page.captureScreenshot`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScreenshotClip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}
