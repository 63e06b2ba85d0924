use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Identifier of a feature, stable across reloads. Numeric ids from the API are kept as their
/// decimal text.
pub type FeatureId = String;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Publication,
    Event,
    Vendor,
    Service,
    Waste,
    Trending,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Publication,
        Category::Event,
        Category::Vendor,
        Category::Service,
        Category::Waste,
        Category::Trending,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Publication => "publication",
            Category::Event => "event",
            Category::Vendor => "vendor",
            Category::Service => "service",
            Category::Waste => "waste",
            Category::Trending => "trending",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Category::ALL
            .iter()
            .find(|category| category.name() == s.trim().to_lowercase())
            .copied()
            .ok_or_else(|| anyhow!("Unknown category '{}'", s))
    }
}

/// Map-order coordinate pair, latitude first. Geometry code works with `geo::Point` (x = longitude,
/// y = latitude); this type is what the map surface and the user deal in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn to_point(self) -> geo::Point {
        geo::Point::new(self.lng, self.lat)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

impl From<geo::Point> for LatLng {
    fn from(point: geo::Point) -> Self {
        Self {
            lat: point.y(),
            lng: point.x(),
        }
    }
}

/// A validated, geotagged record. Only the feature store constructs these from raw input, so the
/// coordinates are always finite WGS-84 degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub date: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Feature {
    pub fn point(&self) -> geo::Point {
        geo::Point::new(self.longitude, self.latitude)
    }

    pub fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

/// Geometry of a feature as received from the API.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawGeometry {
    #[default]
    Missing,
    Point { latitude: f64, longitude: f64 },
    /// Any geometry type other than a point, by its GeoJSON type name.
    Other(String),
}

/// Feature as received, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    pub id: Option<FeatureId>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub geometry: RawGeometry,
}

impl RawFeature {
    pub fn point(
        id: &str,
        category: Category,
        title: &str,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: Some(id.to_string()),
            category: Some(category.name().to_string()),
            title: Some(title.to_string()),
            geometry: RawGeometry::Point {
                latitude,
                longitude,
            },
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Unreadable(String),
    MissingId,
    MissingTitle,
    UnknownCategory(Option<String>),
    MissingGeometry,
    NonPointGeometry(String),
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Unreadable(err) => write!(f, "unreadable feature: {}", err),
            DropReason::MissingId => write!(f, "missing id"),
            DropReason::MissingTitle => write!(f, "missing title"),
            DropReason::UnknownCategory(Some(category)) => {
                write!(f, "unknown category '{}'", category)
            }
            DropReason::UnknownCategory(None) => write!(f, "missing category"),
            DropReason::MissingGeometry => write!(f, "missing geometry"),
            DropReason::NonPointGeometry(kind) => write!(f, "geometry is a {}, not a Point", kind),
            DropReason::InvalidCoordinates {
                latitude,
                longitude,
            } => write!(f, "invalid coordinates (lat {}, lon {})", latitude, longitude),
        }
    }
}

/// Diagnostic kept for every feature the store refused to load.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedFeature {
    pub id: Option<FeatureId>,
    pub reason: DropReason,
}

/// One batch of raw features, plus the entries that could not even be read as features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCollection {
    pub features: Vec<RawFeature>,
    pub rejected: Vec<DroppedFeature>,
}

impl From<Vec<RawFeature>> for RawCollection {
    fn from(features: Vec<RawFeature>) -> Self {
        Self {
            features,
            rejected: Vec::new(),
        }
    }
}

impl TryFrom<RawFeature> for Feature {
    type Error = DroppedFeature;

    fn try_from(raw: RawFeature) -> Result<Self, DroppedFeature> {
        let dropped = |reason| DroppedFeature {
            id: raw.id.clone(),
            reason,
        };
        let (latitude, longitude) = match raw.geometry {
            RawGeometry::Missing => return Err(dropped(DropReason::MissingGeometry)),
            RawGeometry::Other(ref kind) => {
                return Err(dropped(DropReason::NonPointGeometry(kind.clone())))
            }
            RawGeometry::Point {
                latitude,
                longitude,
            } => (latitude, longitude),
        };
        if !is_valid_wgs84(latitude, longitude) {
            return Err(dropped(DropReason::InvalidCoordinates {
                latitude,
                longitude,
            }));
        }
        let id = match &raw.id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => return Err(dropped(DropReason::MissingId)),
        };
        let category = match raw.category.as_deref().map(Category::from_str) {
            Some(Ok(category)) => category,
            _ => return Err(dropped(DropReason::UnknownCategory(raw.category.clone()))),
        };
        let title = match &raw.title {
            Some(title) => title.clone(),
            None => return Err(dropped(DropReason::MissingTitle)),
        };

        Ok(Feature {
            id,
            category,
            title,
            description: raw.description.unwrap_or_default(),
            link: raw.link.filter(|link| !link.is_empty()),
            date: raw.date.filter(|date| !date.is_empty()),
            latitude,
            longitude,
        })
    }
}

fn is_valid_wgs84(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
