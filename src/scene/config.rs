use crate::foundation::error::{DataraceError, DataraceResult};
use crate::scene::color::Color;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// JSON-facing render configuration document.
///
/// Fields left out of a document take the application defaults. Convert with
/// [`RenderConfigDef::validate`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RenderConfigDef {
    /// Race duration in seconds.
    #[serde(alias = "duration")]
    pub duration_seconds: f64,
    /// Number of bars drawn.
    pub top_n: i64,
    /// Bar height in pixels.
    pub bar_height: f64,
    /// Vertical gap between bars in pixels.
    pub gap: f64,
    /// Draw entity icons at the bar ends.
    pub show_icons: bool,
    /// Background color (see [`Color`] for accepted forms).
    pub background_color: serde_json::Value,
    /// Text color.
    pub text_color: serde_json::Value,
}

impl Default for RenderConfigDef {
    fn default() -> Self {
        Self {
            duration_seconds: 15.0,
            top_n: 10,
            bar_height: 50.0,
            gap: 20.0,
            show_icons: true,
            background_color: serde_json::Value::String("#1e293b".to_owned()),
            text_color: serde_json::Value::String("#f8fafc".to_owned()),
        }
    }
}

impl RenderConfigDef {
    /// Validate into a [`RenderConfig`].
    pub fn validate(&self) -> DataraceResult<RenderConfig> {
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(DataraceError::validation(format!(
                "durationSeconds must be finite and > 0, got {}",
                self.duration_seconds
            )));
        }
        if self.top_n < 1 {
            return Err(DataraceError::validation(format!(
                "topN must be >= 1, got {}",
                self.top_n
            )));
        }
        if !self.bar_height.is_finite() || self.bar_height <= 0.0 {
            return Err(DataraceError::validation(format!(
                "barHeight must be finite and > 0, got {}",
                self.bar_height
            )));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(DataraceError::validation(format!(
                "gap must be finite and >= 0, got {}",
                self.gap
            )));
        }
        let background = parse_color("backgroundColor", &self.background_color)?;
        let text = parse_color("textColor", &self.text_color)?;

        let duration = Duration::try_from_secs_f64(self.duration_seconds)
            .map_err(|_| DataraceError::validation("durationSeconds is out of range"))?;

        Ok(RenderConfig {
            duration,
            top_n: usize::try_from(self.top_n)
                .map_err(|_| DataraceError::validation("topN is out of range"))?,
            bar_height: self.bar_height,
            gap: self.gap,
            show_icons: self.show_icons,
            background,
            text,
        })
    }
}

fn parse_color(field: &str, v: &serde_json::Value) -> DataraceResult<Color> {
    Color::deserialize(v)
        .map_err(|e| DataraceError::validation(format!("{field}: invalid color: {e}")))
}

/// Validated render configuration.
///
/// Every numeric field is range-checked and colors are parsed; drawing code trusts these values.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    duration: Duration,
    top_n: usize,
    bar_height: f64,
    gap: f64,
    show_icons: bool,
    background: Color,
    text: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(15),
            top_n: 10,
            bar_height: 50.0,
            gap: 20.0,
            show_icons: true,
            background: Color::rgb(0x1e, 0x29, 0x3b),
            text: Color::rgb(0xf8, 0xfa, 0xfc),
        }
    }
}

impl RenderConfig {
    /// Parse and validate a config document from a JSON string.
    pub fn from_json_str(s: &str) -> DataraceResult<Self> {
        let def: RenderConfigDef = serde_json::from_str(s)
            .map_err(|e| DataraceError::validation(format!("invalid render config JSON: {e}")))?;
        def.validate()
    }

    /// Parse and validate a config document from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> DataraceResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            DataraceError::validation(format!("open render config '{}': {e}", path.display()))
        })?;
        let def: RenderConfigDef = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| DataraceError::validation(format!("invalid render config JSON: {e}")))?;
        def.validate()
    }

    /// Convert back to the document form.
    pub fn to_def(&self) -> RenderConfigDef {
        RenderConfigDef {
            duration_seconds: self.duration.as_secs_f64(),
            top_n: self.top_n as i64,
            bar_height: self.bar_height,
            gap: self.gap,
            show_icons: self.show_icons,
            background_color: serde_json::Value::String(self.background.to_hex()),
            text_color: serde_json::Value::String(self.text.to_hex()),
        }
    }

    /// Full race duration (always > 0).
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of bars drawn (always >= 1).
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Bar height in pixels (always > 0).
    pub fn bar_height(&self) -> f64 {
        self.bar_height
    }

    /// Gap between bars in pixels (always >= 0).
    pub fn gap(&self) -> f64 {
        self.gap
    }

    /// Whether icons are drawn.
    pub fn show_icons(&self) -> bool {
        self.show_icons
    }

    /// Background fill color.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Chrome and value text color.
    pub fn text(&self) -> Color {
        self.text
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/config.rs"]
mod tests;
