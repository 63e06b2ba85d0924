use geo::BoundingRect;

use super::feature::{DroppedFeature, Feature, RawCollection};

/// In-memory holder of the currently loaded feature collection. A load fully supersedes the
/// previous collection; there is no incremental merge.
#[derive(Debug, Default)]
pub struct FeatureStore {
    features: Vec<Feature>,
    dropped: Vec<DroppedFeature>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored collection with the valid features of `raw`, in order. Invalid features
    /// are skipped and kept as diagnostics for this load.
    pub fn load(&mut self, raw: RawCollection) {
        let num_raw = raw.features.len() + raw.rejected.len();
        let mut features = Vec::with_capacity(raw.features.len());
        let mut dropped = raw.rejected;
        for raw_feature in raw.features {
            match Feature::try_from(raw_feature) {
                Ok(feature) => features.push(feature),
                Err(diagnostic) => dropped.push(diagnostic),
            }
        }

        for diagnostic in &dropped {
            log::warn!(
                "Dropping feature {}: {}",
                diagnostic.id.as_deref().unwrap_or("<no id>"),
                diagnostic.reason
            );
        }
        if !dropped.is_empty() {
            log::warn!(
                "Out of {} features read, only {} were valid.",
                num_raw,
                features.len()
            );
        }
        log::info!("Loaded {} features", features.len());

        self.features = features;
        self.dropped = dropped;
    }

    pub fn all(&self) -> &[Feature] {
        &self.features
    }

    /// Diagnostics of the most recent load.
    pub fn dropped(&self) -> &[DroppedFeature] {
        &self.dropped
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.id == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounding rectangle (x = longitude, y = latitude) of all loaded features.
    pub fn bounds(&self) -> Option<geo::Rect> {
        let points: geo::MultiPoint = self.features.iter().map(Feature::point).collect();
        points.bounding_rect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::feature::feature::{Category, DropReason, RawFeature};

    use super::*;

    #[test]
    fn test_load_preserves_order_and_drops_invalid() {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(vec![
            RawFeature::point("b", Category::Vendor, "Second", 6.46, 3.41),
            RawFeature::point("bad", Category::Event, "Broken", f64::NAN, 3.4),
            RawFeature::point("a", Category::Event, "First", 6.45, 3.40),
        ]));

        let ids: Vec<&str> = store.all().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(vec!["b", "a"], ids);
        assert_eq!(1, store.dropped().len());
        assert_eq!(Some("bad".to_string()), store.dropped()[0].id);
        assert!(matches!(
            store.dropped()[0].reason,
            DropReason::InvalidCoordinates { .. }
        ));
    }

    #[test]
    fn test_load_replaces_previous_collection() {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(vec![
            RawFeature::point("1", Category::Event, "Old", 1.0, 1.0),
            RawFeature::point("2", Category::Event, "Broken", f64::NAN, 1.0),
        ]));
        store.load(RawCollection::from(vec![RawFeature::point(
            "3",
            Category::Waste,
            "New",
            2.0,
            2.0,
        )]));

        assert_eq!(1, store.len());
        assert!(store.get("1").is_none());
        assert!(store.get("3").is_some());
        assert!(store.dropped().is_empty());
    }

    #[test]
    fn test_rejected_entries_become_diagnostics() {
        let mut store = FeatureStore::new();
        store.load(RawCollection {
            features: vec![],
            rejected: vec![DroppedFeature {
                id: None,
                reason: DropReason::Unreadable("not an object".to_string()),
            }],
        });
        assert!(store.is_empty());
        assert_eq!(1, store.dropped().len());
    }

    #[test]
    fn test_bounds() {
        let mut store = FeatureStore::new();
        assert!(store.bounds().is_none());
        store.load(RawCollection::from(vec![
            RawFeature::point("1", Category::Event, "A", 6.45, 3.40),
            RawFeature::point("2", Category::Event, "B", 9.10, 8.50),
        ]));
        let bounds = store.bounds().unwrap();
        assert_abs_diff_eq!(3.40, bounds.min().x);
        assert_abs_diff_eq!(6.45, bounds.min().y);
        assert_abs_diff_eq!(8.50, bounds.max().x);
        assert_abs_diff_eq!(9.10, bounds.max().y);
    }
}
