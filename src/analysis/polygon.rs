use geo::{
    algorithm::line_intersection::line_intersection, Centroid, Intersects,
};

use crate::feature::feature::{Feature, LatLng};

use super::{distance_km, AnalysisSummary};

#[derive(Debug)]
pub struct PolygonResult<'a> {
    /// `None` when the drawn ring has fewer than three distinct vertices or a non-finite vertex.
    pub polygon: Option<geo::Polygon>,
    pub matches: Vec<&'a Feature>,
    pub summary: AnalysisSummary,
    /// Matches of a self-intersecting ring are only as meaningful as the point-in-polygon test on
    /// such a ring.
    pub self_intersecting: bool,
}

/// Build a polygon from a drawn ring of map-order vertices. The ring may or may not repeat its
/// first vertex; consecutive duplicates are collapsed.
pub fn polygon_from_ring(ring: &[LatLng]) -> Option<geo::Polygon> {
    if ring.iter().any(|vertex| !vertex.is_finite()) {
        return None;
    }
    let mut coords: Vec<geo::Coord> = Vec::with_capacity(ring.len());
    for vertex in ring {
        let coord = geo::Coord {
            x: vertex.lng,
            y: vertex.lat,
        };
        if coords.last() != Some(&coord) {
            coords.push(coord);
        }
    }
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return None;
    }
    Some(geo::Polygon::new(coords.into(), vec![]))
}

/// Whether any two non-adjacent edges of the exterior ring touch or cross.
pub fn is_self_intersecting(polygon: &geo::Polygon) -> bool {
    let edges: Vec<geo::Line> = polygon.exterior().lines().collect();
    let num_edges = edges.len();
    for i in 0..num_edges {
        for j in (i + 1)..num_edges {
            let adjacent = j == i + 1 || (i == 0 && j == num_edges - 1);
            if !adjacent && line_intersection(edges[i], edges[j]).is_some() {
                return true;
            }
        }
    }
    false
}

/// Every feature whose point lies inside (or on the boundary of) the drawn polygon.
pub fn polygon_query<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    ring: &[LatLng],
) -> PolygonResult<'a> {
    let polygon = polygon_from_ring(ring);
    let self_intersecting = polygon.as_ref().map_or(false, is_self_intersecting);
    if self_intersecting {
        log::warn!("Drawn polygon intersects itself, containment results are best-effort");
    }

    let mut examined = 0;
    let mut matches = Vec::new();
    for feature in features {
        examined += 1;
        if let Some(polygon) = &polygon {
            if polygon.intersects(&feature.point()) {
                matches.push(feature);
            }
        }
    }
    let centroid = polygon.as_ref().and_then(|polygon| polygon.centroid());
    let summary = AnalysisSummary::from_distances(
        examined,
        matches.iter().filter_map(|feature| {
            centroid.map(|centroid| distance_km(centroid, feature.point()))
        }),
    );
    log::debug!(
        "Polygon query matched {} of {} features",
        summary.matched,
        summary.examined
    );

    PolygonResult {
        polygon,
        matches,
        summary,
        self_intersecting,
    }
}
