use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::feature::feature::{Feature, FeatureId, LatLng};

pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 9.0820,
    lng: 8.6753,
};
pub const DEFAULT_ZOOM: u8 = 6;
pub const MAX_ZOOM: u8 = 19;
/// Zoom used when centering on a single feature.
pub const FEATURE_ZOOM: u8 = 15;

/// What the map shows: a center, a zoom level, and optionally the feature whose popup is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: u8,
    #[serde(default)]
    pub feature: Option<FeatureId>,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            feature: None,
        }
    }
}

fn parse_coordinate(value: Option<&String>, limit: f64) -> Option<f64> {
    value
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|parsed| parsed.is_finite() && parsed.abs() <= limit)
}

impl MapView {
    /// Reconstruct a view from a shared link. A center that is missing or unreadable falls back to
    /// the default center, and likewise for the zoom.
    pub fn from_url(url: &str) -> Self {
        match Url::parse(url) {
            Ok(url) => Self::from_query(&url),
            Err(err) => {
                log::warn!("Ignoring unreadable link '{}': {}", url, err);
                Self::default()
            }
        }
    }

    pub fn from_query(url: &Url) -> Self {
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let param = |name: &str| {
            params
                .iter()
                .rev()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)
        };

        let center = match (
            parse_coordinate(param("lat"), 90.0),
            parse_coordinate(param("lng"), 180.0),
        ) {
            (Some(lat), Some(lng)) => LatLng::new(lat, lng),
            _ => DEFAULT_CENTER,
        };
        let zoom = param("zoom")
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|zoom| zoom.is_finite())
            .map(|zoom| zoom.round().clamp(0.0, MAX_ZOOM as f64) as u8)
            .unwrap_or(DEFAULT_ZOOM);
        let feature = param("feature")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        Self {
            center,
            zoom,
            feature,
        }
    }

    /// Link that reopens this view, built on top of `base_url`.
    pub fn share_url(&self, base_url: &str) -> anyhow::Result<String> {
        let mut url = Url::parse(base_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query
                .append_pair("lat", &format!("{:.5}", self.center.lat))
                .append_pair("lng", &format!("{:.5}", self.center.lng))
                .append_pair("zoom", &self.zoom.to_string());
            if let Some(feature) = &self.feature {
                query.append_pair("feature", feature);
            }
        }
        Ok(url.to_string())
    }

    pub fn on_feature(feature: &Feature) -> Self {
        Self {
            center: feature.lat_lng(),
            zoom: FEATURE_ZOOM,
            feature: Some(feature.id.clone()),
        }
    }

    /// Smallest-zoom view that still shows all of `bounds`.
    pub fn fit_bounds(bounds: geo::Rect) -> Self {
        let span = bounds.width().max(bounds.height());
        let zoom = if span > 0.0 {
            (360.0 / span).log2().floor().clamp(0.0, FEATURE_ZOOM as f64) as u8
        } else {
            FEATURE_ZOOM
        };
        Self {
            center: LatLng::from(geo::Point::from(bounds.center())),
            zoom,
            feature: None,
        }
    }
}
