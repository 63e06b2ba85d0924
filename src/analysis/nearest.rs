use crate::feature::feature::Feature;

use super::distance_km;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest<'a> {
    pub feature: &'a Feature,
    pub distance_km: f64,
}

/// Feature with the smallest great-circle distance to `point`. On exact ties the feature that
/// comes first in `features` wins. No features or a non-finite `point`, no result.
pub fn nearest_query<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    point: geo::Point,
) -> Option<Nearest<'a>> {
    if !(point.x().is_finite() && point.y().is_finite()) {
        return None;
    }
    let mut nearest: Option<Nearest<'a>> = None;
    for feature in features {
        let distance_km = distance_km(point, feature.point());
        match &nearest {
            Some(current) if current.distance_km <= distance_km => {}
            _ => {
                nearest = Some(Nearest {
                    feature,
                    distance_km,
                })
            }
        }
    }
    nearest
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::feature::{
        feature::{Category, RawCollection, RawFeature},
        store::FeatureStore,
    };

    use super::*;

    fn load(raw_features: Vec<RawFeature>) -> FeatureStore {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(raw_features));
        store
    }

    #[test]
    fn test_empty_store_has_no_nearest() {
        let store = FeatureStore::new();
        assert!(nearest_query(store.all(), geo::Point::new(3.4, 6.45)).is_none());
    }

    #[test]
    fn test_nearest_feature_and_distance() {
        let store = load(vec![
            RawFeature::point("far", Category::Event, "Far", 9.10, 8.50),
            RawFeature::point("near", Category::Vendor, "Near", 6.46, 3.41),
        ]);
        let nearest = nearest_query(store.all(), geo::Point::new(3.40, 6.45)).unwrap();
        assert_eq!("near", nearest.feature.id);
        assert_abs_diff_eq!(1.56, nearest.distance_km, epsilon = 0.02);
    }

    #[test]
    fn test_non_finite_point_has_no_nearest() {
        let store = load(vec![
            RawFeature::point("a", Category::Event, "A", 6.45, 3.40),
            RawFeature::point("b", Category::Vendor, "B", 9.10, 8.50),
        ]);
        assert!(nearest_query(store.all(), geo::Point::new(f64::NAN, 6.45)).is_none());
        assert!(nearest_query(store.all(), geo::Point::new(3.40, f64::INFINITY)).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_in_store_order() {
        // Mirror images across the query point's meridian are exactly equidistant.
        let store = load(vec![
            RawFeature::point("west", Category::Event, "West", 6.5, 3.25),
            RawFeature::point("east", Category::Event, "East", 6.5, 3.75),
        ]);
        let point = geo::Point::new(3.5, 6.5);
        assert_eq!(
            distance_km(point, store.all()[0].point()),
            distance_km(point, store.all()[1].point())
        );
        assert_eq!("west", nearest_query(store.all(), point).unwrap().feature.id);

        let reversed: Vec<&Feature> = store.all().iter().rev().collect();
        assert_eq!("east", nearest_query(reversed, point).unwrap().feature.id);
    }
}
