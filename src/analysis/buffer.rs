use geo::{HaversineDestination, Intersects};

use crate::feature::feature::Feature;

use super::{distance_km, AnalysisSummary, METERS_PER_KM};

/// Number of vertices used to approximate a circle.
pub const BUFFER_VERTICES: usize = 64;

#[derive(Debug)]
pub struct BufferResult<'a> {
    pub center: geo::Point,
    pub radius_km: f64,
    /// `None` when the radius was not a positive number.
    pub buffer: Option<geo::Polygon>,
    pub matches: Vec<&'a Feature>,
    pub summary: AnalysisSummary,
}

/// Polygon of all points within `radius_km` of `center`, with vertices placed at geodesic distance.
/// Returns `None` for a non-positive or non-finite radius.
pub fn geodesic_buffer(center: geo::Point, radius_km: f64) -> Option<geo::Polygon> {
    if !(radius_km > 0.0 && radius_km.is_finite() && center.x().is_finite() && center.y().is_finite())
    {
        return None;
    }
    let radius_m = radius_km * METERS_PER_KM;
    let ring: Vec<geo::Point> = (0..BUFFER_VERTICES)
        .map(|index| {
            let bearing = 360.0 * index as f64 / BUFFER_VERTICES as f64;
            center.haversine_destination(bearing, radius_m)
        })
        .collect();
    Some(geo::Polygon::new(ring.into(), vec![]))
}

/// True when the ring leaves [-180, 180] or jumps across the antimeridian, where a planar
/// containment test no longer matches the geodesic circle.
fn crosses_antimeridian(buffer: &geo::Polygon) -> bool {
    let ring = &buffer.exterior().0;
    ring.iter().any(|coord| coord.x.abs() > 180.0)
        || ring.windows(2).any(|pair| (pair[1].x - pair[0].x).abs() > 180.0)
}

/// Every feature whose point lies inside (or on) the geodesic buffer around `center`.
/// A radius of zero or less matches nothing. Buffers straddling the antimeridian fall back to
/// comparing great-circle distances.
pub fn buffer_query<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    center: geo::Point,
    radius_km: f64,
) -> BufferResult<'a> {
    let buffer = geodesic_buffer(center, radius_km);
    let by_distance = buffer.as_ref().map_or(false, crosses_antimeridian);
    if by_distance {
        log::debug!("Buffer around {:?} crosses the antimeridian", center);
    }
    let mut examined = 0;
    let mut matches = Vec::new();
    for feature in features {
        examined += 1;
        if let Some(buffer) = &buffer {
            let inside = if by_distance {
                distance_km(center, feature.point()) <= radius_km
            } else {
                buffer.intersects(&feature.point())
            };
            if inside {
                matches.push(feature);
            }
        }
    }
    let summary = AnalysisSummary::from_distances(
        examined,
        matches
            .iter()
            .map(|feature| distance_km(center, feature.point())),
    );
    log::debug!(
        "Buffer query of {} km matched {} of {} features",
        radius_km,
        summary.matched,
        summary.examined
    );

    BufferResult {
        center,
        radius_km,
        buffer,
        matches,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::{fixture, rstest};

    use crate::feature::{
        feature::{Category, RawCollection, RawFeature},
        store::FeatureStore,
    };

    use super::*;

    #[fixture]
    fn store() -> FeatureStore {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(vec![
            RawFeature::point("E", Category::Event, "Street party", 6.45, 3.40),
            RawFeature::point("V", Category::Vendor, "Suya spot", 6.46, 3.41),
        ]));
        store
    }

    fn match_ids(result: &BufferResult) -> Vec<String> {
        result.matches.iter().map(|f| f.id.clone()).collect()
    }

    #[rstest]
    #[case(5.0, vec!["E", "V"])]
    #[case(0.01, vec!["E"])]
    fn test_buffer_query_around_event(
        store: FeatureStore,
        #[case] radius_km: f64,
        #[case] expected: Vec<&str>,
    ) {
        let center = store.get("E").unwrap().point();
        let result = buffer_query(store.all(), center, radius_km);
        assert_eq!(expected, match_ids(&result));
        assert_eq!(2, result.summary.examined);
        assert_eq!(Some(0.0), result.summary.nearest_km);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-3.0)]
    #[case(f64::NAN)]
    fn test_non_positive_radius_matches_nothing(store: FeatureStore, #[case] radius_km: f64) {
        let center = store.get("E").unwrap().point();
        let result = buffer_query(store.all(), center, radius_km);
        assert!(result.matches.is_empty());
        assert!(result.buffer.is_none());
        assert_eq!(0, result.summary.matched);
    }

    #[test]
    fn test_buffer_across_antimeridian() {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(vec![
            RawFeature::point("west", Category::Event, "Date line east side", 0.0, -179.995),
            RawFeature::point("far", Category::Event, "Far away", 0.0, -170.0),
        ]));
        let center = geo::Point::new(179.995, 0.0);
        let result = buffer_query(store.all(), center, 5.0);
        assert_eq!(vec!["west"], match_ids(&result));
        assert_abs_diff_eq!(1.11, result.summary.nearest_km.unwrap(), epsilon = 0.01);
    }

    #[test]
    fn test_buffer_vertices_are_at_radius() {
        let center = geo::Point::new(3.40, 6.45);
        let buffer = geodesic_buffer(center, 5.0).unwrap();
        // Closed ring repeats the first vertex.
        assert_eq!(BUFFER_VERTICES + 1, buffer.exterior().0.len());
        for vertex in buffer.exterior().points() {
            assert_abs_diff_eq!(5.0, distance_km(center, vertex), epsilon = 1e-6);
        }
    }
}
