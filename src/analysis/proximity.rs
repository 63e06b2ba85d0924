use crate::feature::feature::{Category, Feature};

use super::buffer::buffer_query;

pub const DEFAULT_PROXIMITY_RADIUS_KM: f64 = 50.0;

#[derive(Debug)]
pub struct ProximityHit<'a> {
    pub event: &'a Feature,
    pub buffer: geo::Polygon,
    pub vendors: Vec<&'a Feature>,
}

/// For every event, the vendors inside a geodesic buffer of `radius_km` around it. Events keep
/// store order; events without nearby vendors are still reported so their buffer can be drawn.
pub fn vendors_near_events(features: &[Feature], radius_km: f64) -> Vec<ProximityHit<'_>> {
    let vendors: Vec<&Feature> = features
        .iter()
        .filter(|feature| feature.category == Category::Vendor)
        .collect();

    features
        .iter()
        .filter(|feature| feature.category == Category::Event)
        .filter_map(|event| {
            let result = buffer_query(vendors.iter().copied(), event.point(), radius_km);
            result.buffer.map(|buffer| ProximityHit {
                event,
                buffer,
                vendors: result.matches,
            })
        })
        .collect()
}
