use std::{fs, path::Path};

use anyhow::Context;
use serde_json::Value as JsonValue;

use super::{
    error::LoadError,
    feature::{DropReason, DroppedFeature, Feature, RawCollection, RawFeature, RawGeometry},
};

/// Parse a GeoJSON FeatureCollection body into raw features.
///
/// A body that is not a JSON object with a `features` array is malformed and fails the whole load.
/// Entries of the array that cannot be read as GeoJSON features are only rejected individually.
pub fn parse_feature_collection(body: &str) -> Result<RawCollection, LoadError> {
    let mut value: JsonValue = serde_json::from_str(body)
        .map_err(|err| LoadError::Malformed(format!("invalid JSON: {}", err)))?;
    let entries = match value.get_mut("features").map(JsonValue::take) {
        Some(JsonValue::Array(entries)) => entries,
        Some(_) => {
            return Err(LoadError::Malformed(
                "'features' member is not an array".to_string(),
            ))
        }
        None => {
            return Err(LoadError::Malformed(
                "missing 'features' member".to_string(),
            ))
        }
    };

    let mut collection = RawCollection::default();
    for entry in entries {
        let entry_id = entry.pointer("/properties/id").and_then(id_to_string);
        match serde_json::from_value::<geojson::Feature>(entry) {
            Ok(feature) => collection.features.push(raw_feature_from_geojson(feature)),
            Err(err) => collection.rejected.push(DroppedFeature {
                id: entry_id,
                reason: DropReason::Unreadable(err.to_string()),
            }),
        }
    }
    Ok(collection)
}

fn id_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(id) => Some(id.clone()),
        JsonValue::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn string_property(feature: &geojson::Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn raw_feature_from_geojson(feature: geojson::Feature) -> RawFeature {
    let id = feature
        .property("id")
        .and_then(id_to_string)
        .or_else(|| match &feature.id {
            Some(geojson::feature::Id::String(id)) => Some(id.clone()),
            Some(geojson::feature::Id::Number(id)) => Some(id.to_string()),
            None => None,
        });
    // GeoJSON positions are [longitude, latitude].
    let geometry = match feature.geometry.as_ref().map(|geometry| &geometry.value) {
        None => RawGeometry::Missing,
        Some(geojson::Value::Point(position)) if position.len() >= 2 => RawGeometry::Point {
            latitude: position[1],
            longitude: position[0],
        },
        Some(geojson::Value::Point(position)) => {
            RawGeometry::Other(format!("Point with {} coordinates", position.len()))
        }
        Some(other) => RawGeometry::Other(geometry_type_name(other).to_string()),
    };

    RawFeature {
        id,
        category: string_property(&feature, "category"),
        title: string_property(&feature, "title"),
        description: string_property(&feature, "description"),
        link: string_property(&feature, "link"),
        date: string_property(&feature, "date"),
        geometry,
    }
}

pub fn feature_to_geojson(feature: &Feature) -> geojson::Feature {
    let mut properties = geojson::JsonObject::new();
    properties.insert("id".to_string(), JsonValue::from(feature.id.clone()));
    properties.insert(
        "category".to_string(),
        JsonValue::from(feature.category.name()),
    );
    properties.insert("title".to_string(), JsonValue::from(feature.title.clone()));
    properties.insert(
        "description".to_string(),
        JsonValue::from(feature.description.clone()),
    );
    properties.insert("link".to_string(), JsonValue::from(feature.link.clone()));
    properties.insert("date".to_string(), JsonValue::from(feature.date.clone()));

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::from(&feature.point())),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn features_to_geojson<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
) -> geojson::FeatureCollection {
    features.into_iter().map(feature_to_geojson).collect()
}

pub fn write_geojson(
    feature_collection: geojson::FeatureCollection,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    fs::write(output_filepath, geojson_contents.to_string())
        .with_context(|| format!("Writing GeoJSON to {:?}", output_filepath))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use testdir::testdir;

    use crate::{
        feature::{
            feature::{Category, LatLng},
            store::FeatureStore,
        },
        filter::visibility::{compute_visible, CategorySelection, FilterState},
    };

    use super::*;

    const BODY: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"id": 1, "category": "event", "title": "Market Day",
                               "description": "Weekly market", "link": null, "date": "2024-06-01"},
                "geometry": {"type": "Point", "coordinates": [8.50, 9.10]}
            },
            {
                "type": "Feature",
                "properties": {"id": "v-2", "category": "vendor", "title": "Fruit stall"},
                "geometry": {"type": "LineString", "coordinates": [[8.5, 9.1], [8.6, 9.2]]}
            },
            {
                "type": "Feature",
                "properties": {"id": 3, "category": "waste", "title": "Broken"},
                "geometry": {"type": "Point", "coordinates": "nowhere"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let collection = parse_feature_collection(BODY).unwrap();
        assert_eq!(2, collection.features.len());
        assert_eq!(1, collection.rejected.len());
        assert_eq!(Some("3".to_string()), collection.rejected[0].id);

        let first = &collection.features[0];
        assert_eq!(Some("1".to_string()), first.id);
        assert_eq!(Some("event".to_string()), first.category);
        assert_eq!(None, first.link);
        assert_eq!(
            RawGeometry::Point {
                latitude: 9.10,
                longitude: 8.50
            },
            first.geometry
        );
        assert_eq!(
            RawGeometry::Other("LineString".to_string()),
            collection.features[1].geometry
        );
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"type": "FeatureCollection"}"#)]
    #[case(r#"{"type": "FeatureCollection", "features": {}}"#)]
    #[case("[]")]
    fn test_malformed_collection(#[case] body: &str) {
        assert!(matches!(
            parse_feature_collection(body),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn test_axis_order_survives_filter_cycle() {
        let mut store = FeatureStore::new();
        store.load(parse_feature_collection(BODY).unwrap());
        assert_eq!(1, store.len());
        let original = store.all()[0].clone();
        assert_eq!(LatLng::new(9.10, 8.50), original.lat_lng());

        let mut filter = FilterState::default();
        filter.selected_category = CategorySelection::Only(Category::Vendor);
        assert!(compute_visible(store.all(), &filter).is_empty());
        filter.selected_category = CategorySelection::All;
        let visible = compute_visible(store.all(), &filter);
        assert_eq!(vec![&original], visible);
        assert_eq!(LatLng::new(9.10, 8.50), visible[0].lat_lng());
    }

    #[test]
    fn test_written_geojson_reads_back() {
        let mut store = FeatureStore::new();
        store.load(parse_feature_collection(BODY).unwrap());

        let test_dir = testdir!();
        let output_filepath = test_dir.join("visible.geojson");
        write_geojson(features_to_geojson(store.all()), &output_filepath).unwrap();

        let contents = fs::read_to_string(&output_filepath).unwrap();
        let mut reloaded = FeatureStore::new();
        reloaded.load(parse_feature_collection(&contents).unwrap());
        assert_eq!(store.all(), reloaded.all());
    }
}
