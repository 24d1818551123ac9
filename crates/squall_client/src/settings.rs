use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::renderer::weather::geometry::WeatherKind;
use crate::renderer::weather::height_map::{
    ScanParams, DEFAULT_MAX_DEPTH, DEFAULT_RADIUS, DEFAULT_START_Y,
};

const MIN_RADIUS: i32 = 0;
const MAX_RADIUS: i32 = 32;
const MIN_SCAN_START_Y: i32 = -512;
const MAX_SCAN_START_Y: i32 = 512;
const MIN_SCAN_DEPTH: u32 = 1;
const MAX_SCAN_DEPTH: u32 = 512;
const MIN_VIEW_DISTANCE: i32 = 1;
const MAX_VIEW_DISTANCE: i32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_kind")]
    pub kind: WeatherKind,
    #[serde(default = "default_radius")]
    pub radius: i32,
    #[serde(default = "default_scan_start_y")]
    pub scan_start_y: i32,
    #[serde(default = "default_scan_depth")]
    pub scan_depth: u32,
    #[serde(default = "default_world_seed")]
    pub world_seed: u64,
    #[serde(default = "default_view_distance_chunks")]
    pub view_distance_chunks: i32,
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: default_kind(),
            radius: default_radius(),
            scan_start_y: default_scan_start_y(),
            scan_depth: default_scan_depth(),
            world_seed: default_world_seed(),
            view_distance_chunks: default_view_distance_chunks(),
            use_gpu: default_use_gpu(),
        }
    }
}

impl WeatherSettings {
    pub fn sanitize(mut self) -> Self {
        self.radius = self.radius.clamp(MIN_RADIUS, MAX_RADIUS);
        self.scan_start_y = self.scan_start_y.clamp(MIN_SCAN_START_Y, MAX_SCAN_START_Y);
        self.scan_depth = self.scan_depth.clamp(MIN_SCAN_DEPTH, MAX_SCAN_DEPTH);
        self.view_distance_chunks = self
            .view_distance_chunks
            .clamp(MIN_VIEW_DISTANCE, MAX_VIEW_DISTANCE);
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize weather settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize weather settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }

    /// A missing file is not an error; a broken one is reported and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                warn!("Failed to load settings from {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Like [`load_or_default`](Self::load_or_default), but a missing file is
    /// written out with the defaults so there is something to edit.
    pub fn load_or_create(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let settings = Self::default();
                if let Err(save_err) = settings.save(path) {
                    warn!(
                        "Failed to create default settings at {}: {save_err}",
                        path.display()
                    );
                }
                settings
            }
            Err(err) => {
                warn!("Failed to load settings from {}: {err}", path.display());
                Self::default()
            }
        }
    }

    pub fn scan_params(&self) -> ScanParams {
        ScanParams {
            radius: self.radius,
            start_y: self.scan_start_y,
            max_depth: self.scan_depth,
        }
    }
}

fn default_kind() -> WeatherKind {
    WeatherKind::Rain
}

fn default_radius() -> i32 {
    DEFAULT_RADIUS
}

fn default_scan_start_y() -> i32 {
    DEFAULT_START_Y
}

fn default_scan_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_world_seed() -> u64 {
    0x5EED_CAFE
}

fn default_view_distance_chunks() -> i32 {
    3
}

fn default_use_gpu() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::WeatherSettings;
    use crate::renderer::weather::geometry::WeatherKind;
    use crate::renderer::weather::height_map::ScanParams;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("squall-{name}-{pid}-{nanos}.toml"))
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: WeatherSettings = toml::from_str("kind = \"snow\"\nradius = 5\n").unwrap();
        assert_eq!(parsed.kind, WeatherKind::Snow);
        assert_eq!(parsed.radius, 5);
        assert!(!parsed.enabled);
        assert_eq!(parsed.scan_params().start_y, 128);
        assert!(parsed.use_gpu);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let settings = WeatherSettings {
            radius: 500,
            scan_start_y: -4000,
            scan_depth: 0,
            view_distance_chunks: 40,
            ..WeatherSettings::default()
        }
        .sanitize();

        assert_eq!(
            settings.scan_params(),
            ScanParams {
                radius: 32,
                start_y: -512,
                max_depth: 1,
            }
        );
        assert_eq!(settings.view_distance_chunks, 8);
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let path = temp_path("roundtrip");
        let settings = WeatherSettings {
            enabled: true,
            kind: WeatherKind::Snow,
            world_seed: 99,
            ..WeatherSettings::default()
        };

        settings.save(&path).unwrap();
        let loaded = WeatherSettings::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, settings);
    }

    #[test]
    fn malformed_file_is_invalid_data_and_defaults_are_used() {
        let path = temp_path("broken");
        fs::write(&path, "radius = \"wide\"").unwrap();

        let err = WeatherSettings::load(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(
            WeatherSettings::load_or_default(&path),
            WeatherSettings::default()
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("absent");
        assert_eq!(
            WeatherSettings::load_or_default(&path),
            WeatherSettings::default()
        );
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let path = temp_path("created");

        let settings = WeatherSettings::load_or_create(&path);
        let written = WeatherSettings::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(settings, WeatherSettings::default());
        assert_eq!(written, settings);
    }

    #[test]
    fn broken_file_is_left_alone_by_load_or_create() {
        let path = temp_path("kept");
        fs::write(&path, "scan_depth = -3").unwrap();

        let settings = WeatherSettings::load_or_create(&path);
        let contents = fs::read_to_string(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(settings, WeatherSettings::default());
        assert_eq!(contents, "scan_depth = -3");
    }
}
