use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use serde::Deserialize;

use crate::{
    filter::debounce::DEFAULT_SEARCH_DEBOUNCE,
    view::{banner::DEFAULT_BANNER_TTL, deep_link::MapView},
};

fn default_session_filepath() -> PathBuf {
    PathBuf::from("geoboard_session.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_debounce_ms() -> u64 {
    DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64
}

fn default_banner_ms() -> u64 {
    DEFAULT_BANNER_TTL.as_millis() as u64
}

fn default_share_base_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_username() -> String {
    "guest".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Root of the event API, e.g. `http://localhost:3000/api`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// GeoJSON file to read features from when no API is configured.
    #[serde(default)]
    pub data_filepath: Option<PathBuf>,
    #[serde(default = "default_session_filepath")]
    pub session_filepath: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_banner_ms")]
    pub banner_ms: u64,
    #[serde(default)]
    pub default_view: MapView,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
    /// Place-name search endpoint; Nominatim when unset.
    #[serde(default)]
    pub geocoder_url: Option<String>,
    #[serde(default = "default_username")]
    pub username: String,
}

impl Config {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        if config.api_base_url.is_none() && config.data_filepath.is_none() {
            return Err(anyhow!(
                "Config needs either api_base_url or data_filepath to load features from"
            ));
        }
        Ok(config)
    }

    pub fn from_file(config_filepath: &Path) -> anyhow::Result<Self> {
        if !config_filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", config_filepath));
        }
        let config_contents = read_to_string(config_filepath)?;
        Self::from_yaml(&config_contents)
    }
}

#[cfg(test)]
mod tests {
    use testdir::testdir;

    use crate::feature::feature::LatLng;

    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml("api_base_url: http://localhost:3000/api\n").unwrap();
        assert_eq!(300, config.debounce_ms);
        assert_eq!(5000, config.banner_ms);
        assert_eq!(MapView::default(), config.default_view);
        assert_eq!(PathBuf::from("output"), config.output_dir);
        assert_eq!("guest", config.username);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(
            r#"
data_filepath: data/wema.geojson
session_filepath: /tmp/session.json
output_dir: /tmp/out
debounce_ms: 150
banner_ms: 2000
username: ada
default_view:
  center: {lat: 6.45, lng: 3.4}
  zoom: 11
"#,
        )
        .unwrap();
        assert_eq!(None, config.api_base_url);
        assert_eq!(Some(PathBuf::from("data/wema.geojson")), config.data_filepath);
        assert_eq!(150, config.debounce_ms);
        assert_eq!(LatLng::new(6.45, 3.4), config.default_view.center);
        assert_eq!(11, config.default_view.zoom);
    }

    #[test]
    fn test_config_needs_a_source() {
        assert!(Config::from_yaml("username: ada\n").is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let test_dir = testdir!();
        assert!(Config::from_file(&test_dir.join("missing.yaml")).is_err());
        let filepath = test_dir.join("config.yaml");
        std::fs::write(&filepath, "data_filepath: events.geojson\n").unwrap();
        assert!(Config::from_file(&filepath).is_ok());
    }
}
