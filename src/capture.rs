//! Screen capture — primary screen (or a fixed area) to PNG bytes.

use std::io::Cursor;

use anyhow::{Context, Result};
use screenshots::image::ImageOutputFormat;
use screenshots::Screen;

use crate::config::{CaptureArea, CaptureConfig};

/// Something that can produce a PNG screenshot on demand.
pub trait ScreenCapturer: Send + Sync {
    fn capture(&self) -> Result<Vec<u8>>;
    fn name(&self) -> &str;
}

/// Captures the primary screen via the `screenshots` crate.
pub struct PrimaryScreenCapturer {
    area: Option<CaptureArea>,
}

impl PrimaryScreenCapturer {
    pub fn from_config(cfg: &CaptureConfig) -> Self {
        let area = match cfg.mode.as_str() {
            "area" => {
                if cfg.area.is_none() {
                    log::warn!("capture.mode is \"area\" but no area is configured, using full screen");
                }
                cfg.area
            }
            "full" => None,
            other => {
                log::warn!("Unknown capture.mode {other:?}, using full screen");
                None
            }
        };
        Self { area }
    }

    fn primary_screen() -> Result<Screen> {
        let screens = Screen::all().context("failed to enumerate screens")?;
        screens
            .iter()
            .find(|s| s.display_info.is_primary)
            .or_else(|| screens.first())
            .copied()
            .context("no screens detected")
    }
}

impl ScreenCapturer for PrimaryScreenCapturer {
    fn capture(&self) -> Result<Vec<u8>> {
        let screen = Self::primary_screen()?;
        log::info!(
            "Capturing screen {}x{} at ({}, {})",
            screen.display_info.width,
            screen.display_info.height,
            screen.display_info.x,
            screen.display_info.y
        );

        let image = match self.area {
            Some(area) => screen
                .capture_area(area.x, area.y, area.width, area.height)
                .context("failed to capture screen area")?,
            None => screen.capture().context("failed to capture screen")?,
        };

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageOutputFormat::Png)
            .context("failed to encode screenshot as PNG")?;
        let bytes = png.into_inner();
        log::info!("Screenshot captured ({} bytes)", bytes.len());
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "primary-screen"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;

    #[test]
    fn full_mode_has_no_area() {
        let capturer = PrimaryScreenCapturer::from_config(&CaptureConfig::default());
        assert!(capturer.area.is_none());
    }

    #[test]
    fn area_mode_uses_configured_rectangle() {
        let cfg = CaptureConfig {
            mode: "area".into(),
            area: Some(CaptureArea { x: 10, y: 20, width: 300, height: 200 }),
            cooldown_secs: 2.0,
        };
        let capturer = PrimaryScreenCapturer::from_config(&cfg);
        let area = capturer.area.unwrap();
        assert_eq!((area.x, area.y, area.width, area.height), (10, 20, 300, 200));
    }

    #[test]
    fn area_mode_without_rectangle_falls_back_to_full() {
        let cfg = CaptureConfig {
            mode: "area".into(),
            area: None,
            cooldown_secs: 2.0,
        };
        let capturer = PrimaryScreenCapturer::from_config(&cfg);
        assert!(capturer.area.is_none());
    }
}
