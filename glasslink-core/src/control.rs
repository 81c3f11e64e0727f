//! Control plane for lens discovery and configuration.
//!
//! This module manages:
//! - Lens side identification from advertised names
//! - Configuration shared by the session and the client

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_left_marker() -> String {
    "_l_".to_string()
}

fn default_right_marker() -> String {
    "_r_".to_string()
}

fn default_family_marker() -> String {
    "even".to_string()
}

/// Configuration for a pair of glasses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlassesConfig {
    /// Name fragment identifying the left lens
    #[serde(default = "default_left_marker")]
    pub left_marker: String,
    /// Name fragment identifying the right lens
    #[serde(default = "default_right_marker")]
    pub right_marker: String,
    /// Name fragment every lens of the product family carries
    #[serde(default = "default_family_marker")]
    pub family_marker: String,

    /// Deadline for finding both lenses in one scan
    #[serde(with = "humantime_serde")]
    pub scan_timeout: Duration,
    /// Delay between advertisement enumerations during a scan
    #[serde(with = "humantime_serde")]
    pub scan_poll_interval: Duration,
    /// Scan/connect attempts made by the client before giving up
    pub scan_attempts: u32,

    /// Deadline for connecting and initializing both lenses
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// How long to wait for a chunk acknowledgment
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,
    /// Acknowledgment polling interval
    #[serde(with = "humantime_serde")]
    pub ack_poll_interval: Duration,
    /// Pause after each acknowledged chunk
    #[serde(with = "humantime_serde")]
    pub chunk_spacing: Duration,
    /// Pause between pages, giving the wearer time to read
    #[serde(with = "humantime_serde")]
    pub page_pause: Duration,

    /// Keep-alive interval
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for GlassesConfig {
    fn default() -> Self {
        Self {
            left_marker: default_left_marker(),
            right_marker: default_right_marker(),
            family_marker: default_family_marker(),
            scan_timeout: Duration::from_secs(10),
            scan_poll_interval: Duration::from_secs(1),
            scan_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(2),
            ack_poll_interval: Duration::from_millis(100),
            chunk_spacing: Duration::from_millis(100),
            page_pause: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(8),
        }
    }
}

/// Which lens of the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LensSide {
    Left,
    Right,
}

impl LensSide {
    /// Both sides, in delivery order
    pub const ALL: [LensSide; 2] = [LensSide::Left, LensSide::Right];
}

impl fmt::Display for LensSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// A discovered lens
#[derive(Debug, Clone)]
pub struct LensIdentity<H> {
    /// Side derived from the advertised name
    pub side: LensSide,
    /// Advertised name
    pub name: String,
    /// Transport handle used to reach the lens
    pub handle: H,
}

/// Lens identification from advertised names
#[derive(Debug, Clone)]
pub struct LensDiscovery {
    left: String,
    right: String,
    family: String,
}

impl LensDiscovery {
    /// Build the matcher from configured markers.
    pub fn new(config: &GlassesConfig) -> Self {
        Self {
            left: config.left_marker.to_lowercase(),
            right: config.right_marker.to_lowercase(),
            family: config.family_marker.to_lowercase(),
        }
    }

    /// Side of the lens advertising `name`, if it belongs to the family.
    ///
    /// Matching is a case-insensitive substring test. A name carrying both
    /// side markers is treated as left.
    pub fn classify(&self, name: &str) -> Option<LensSide> {
        let name = name.to_lowercase();
        if !name.contains(&self.family) {
            return None;
        }
        if name.contains(&self.left) {
            Some(LensSide::Left)
        } else if name.contains(&self.right) {
            Some(LensSide::Right)
        } else {
            None
        }
    }
}

impl Default for LensDiscovery {
    fn default() -> Self {
        Self::new(&GlassesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glasses_config_default() {
        let config = GlassesConfig::default();
        assert_eq!(config.scan_timeout, Duration::from_secs(10));
        assert_eq!(config.scan_attempts, 5);
        assert_eq!(config.ack_timeout, Duration::from_secs(2));
        assert_eq!(config.ack_poll_interval, Duration::from_millis(100));
        assert_eq!(config.page_pause, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(8));
        assert_eq!(config.left_marker, "_l_");
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = GlassesConfig {
            page_pause: Duration::from_millis(1500),
            ..Default::default()
        };
        let raw = toml::to_string_pretty(&config).expect("serialize");
        assert!(raw.contains("page_pause = \"1s 500ms\""));

        let parsed: GlassesConfig = toml::from_str(&raw).expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_markers_optional() {
        let raw = r#"
            scan_timeout = "3s"
            scan_poll_interval = "250ms"
            scan_attempts = 2
            connect_timeout = "10s"
            ack_timeout = "2s"
            ack_poll_interval = "100ms"
            chunk_spacing = "100ms"
            page_pause = "5s"
            heartbeat_interval = "8s"
        "#;
        let parsed: GlassesConfig = toml::from_str(raw).expect("parse");
        assert_eq!(parsed.scan_timeout, Duration::from_secs(3));
        assert_eq!(parsed.family_marker, "even");
        assert_eq!(parsed.right_marker, "_r_");
    }

    #[test]
    fn test_classify_lens_names() {
        let discovery = LensDiscovery::default();
        assert_eq!(discovery.classify("Even G1_42_L_3A9F"), Some(LensSide::Left));
        assert_eq!(discovery.classify("EVEN G1_42_R_3A9F"), Some(LensSide::Right));
        assert_eq!(discovery.classify("G1_42_L_3A9F"), None);
        assert_eq!(discovery.classify("Even G1 charger"), None);
        assert_eq!(discovery.classify(""), None);
    }

    #[test]
    fn test_classify_custom_markers() {
        let config = GlassesConfig {
            left_marker: "-LEFT".to_string(),
            right_marker: "-RIGHT".to_string(),
            family_marker: "Frame".to_string(),
            ..Default::default()
        };
        let discovery = LensDiscovery::new(&config);
        assert_eq!(discovery.classify("frame-left"), Some(LensSide::Left));
        assert_eq!(discovery.classify("FRAME-right"), Some(LensSide::Right));
    }

    #[test]
    fn test_side_display() {
        assert_eq!(LensSide::Left.to_string(), "left");
        assert_eq!(LensSide::ALL, [LensSide::Left, LensSide::Right]);
    }
}
