//! One-shot spatial analyses over loaded features, and the aggregations the map surface uses to
//! draw clusters and heat cells. Geometry primitives come from the `geo` crate.
use geo::HaversineDistance;

pub mod aggregate;
pub mod buffer;
pub mod nearest;
pub mod polygon;
pub mod proximity;

pub const METERS_PER_KM: f64 = 1000.0;

/// Great-circle distance in kilometers.
pub fn distance_km(from: geo::Point, to: geo::Point) -> f64 {
    from.haversine_distance(&to) / METERS_PER_KM
}

/// Side-effect free summary of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalysisSummary {
    /// Number of features the analysis looked at.
    pub examined: usize,
    pub matched: usize,
    /// Distance range of the matches from the analysis origin (buffer center, polygon centroid).
    pub nearest_km: Option<f64>,
    pub farthest_km: Option<f64>,
}

impl AnalysisSummary {
    pub fn from_distances(examined: usize, distances: impl IntoIterator<Item = f64>) -> Self {
        let mut summary = Self {
            examined,
            ..Default::default()
        };
        for distance in distances {
            summary.matched += 1;
            summary.nearest_km = Some(summary.nearest_km.map_or(distance, |d| d.min(distance)));
            summary.farthest_km = Some(summary.farthest_km.map_or(distance, |d| d.max(distance)));
        }
        summary
    }
}
