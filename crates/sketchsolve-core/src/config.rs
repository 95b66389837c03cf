//! Runtime settings.

use crate::surface::Rgba;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the solver endpoint.
pub const ENDPOINT_ENV: &str = "SKETCHSOLVE_API_URL";

/// Ink color swatches offered by the shell.
pub const SWATCHES: [Rgba; 8] = [
    Rgba {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    }, // white
    Rgba {
        r: 238,
        g: 58,
        b: 58,
        a: 255,
    }, // red
    Rgba {
        r: 250,
        g: 176,
        b: 5,
        a: 255,
    }, // yellow
    Rgba {
        r: 64,
        g: 192,
        b: 87,
        a: 255,
    }, // green
    Rgba {
        r: 77,
        g: 171,
        b: 247,
        a: 255,
    }, // blue
    Rgba {
        r: 151,
        g: 117,
        b: 250,
        a: 255,
    }, // violet
    Rgba {
        r: 255,
        g: 146,
        b: 43,
        a: 255,
    }, // orange
    Rgba {
        r: 240,
        g: 101,
        b: 149,
        a: 255,
    }, // pink
];

/// Shell and session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Solver service base URL (no trailing path).
    pub endpoint: String,
    /// Multiplier from pointer pressure to stroke width.
    pub width_scale: f64,
    /// Presentation color composited beneath the ink.
    pub background: Rgba,
    /// Overlay anchor used when a blank canvas is submitted.
    pub default_anchor: Point,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8900".to_string(),
            width_scale: 4.0,
            background: Rgba::black(),
            default_anchor: Point::new(10.0, 200.0),
        }
    }
}

impl Settings {
    /// Defaults with the endpoint taken from `SKETCHSOLVE_API_URL` when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.is_empty() {
                settings.endpoint = endpoint;
            }
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.width_scale, 4.0);
        assert_eq!(settings.background, Rgba::black());
        assert_eq!(settings.default_anchor, Point::new(10.0, 200.0));
    }

    #[test]
    fn test_json_roundtrip_with_partial_input() {
        let settings: Settings =
            serde_json::from_str(r#"{"endpoint": "http://solver:9000"}"#).unwrap();
        assert_eq!(settings.endpoint, "http://solver:9000");
        // Unspecified fields fall back to defaults.
        assert_eq!(settings.width_scale, 4.0);

        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.endpoint, settings.endpoint);
    }
}
