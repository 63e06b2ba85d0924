use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde_json::Value as JsonValue;

use crate::feature::{
    feature::{Category, Feature, FeatureId},
    geojson::{feature_to_geojson, write_geojson},
};

use super::{banner::Banner, deep_link::MapView};

pub const VISIBLE_FILENAME: &str = "visible.geojson";
pub const ANALYSIS_FILENAME: &str = "analysis.geojson";

/// Marker appearance of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStyle {
    pub color: &'static str,
    pub radius: u8,
}

pub fn style_for(category: Category) -> CategoryStyle {
    match category {
        Category::Publication => CategoryStyle {
            color: "#ff7800",
            radius: 8,
        },
        Category::Event => CategoryStyle {
            color: "#00ff00",
            radius: 10,
        },
        Category::Vendor => CategoryStyle {
            color: "#0000ff",
            radius: 8,
        },
        Category::Service => CategoryStyle {
            color: "#ff00ff",
            radius: 8,
        },
        Category::Waste => CategoryStyle {
            color: "#FF00FF",
            radius: 8,
        },
        Category::Trending => CategoryStyle {
            color: "#000000",
            radius: 8,
        },
    }
}

/// Query shapes of the last analysis. The matched features are drawn alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    pub label: String,
    pub shapes: Vec<geo::Geometry>,
}

/// The drawing surface. Core components never talk to it directly; the controller does.
pub trait RenderAdapter {
    /// Replace all markers with `visible`.
    fn redraw(&mut self, visible: &[&Feature], bookmarks: &[FeatureId]) -> anyhow::Result<()>;
    /// Draw `highlight`, replacing whatever the previous analysis drew.
    fn highlight(&mut self, highlight: &Highlight, features: &[&Feature]) -> anyhow::Result<()>;
    fn clear_highlight(&mut self) -> anyhow::Result<()>;
    fn show_banner(&mut self, banner: &Banner);
    fn set_view(&mut self, view: &MapView);
    fn open_popup(&mut self, feature: &Feature);
}

pub fn popup_text(feature: &Feature) -> String {
    let mut text = format!("{} [{}]", feature.title, feature.category);
    if !feature.description.is_empty() {
        text.push('\n');
        text.push_str(&feature.description);
    }
    if let Some(date) = &feature.date {
        text.push_str(&format!("\nDate: {}", date));
    }
    if let Some(link) = &feature.link {
        text.push_str(&format!("\nMore info: {}", link));
    }
    text
}

fn marker(feature: &Feature, bookmarked: bool) -> geojson::Feature {
    let style = style_for(feature.category);
    let mut marker = feature_to_geojson(feature);
    if let Some(properties) = marker.properties.as_mut() {
        properties.insert("marker-color".to_string(), JsonValue::from(style.color));
        properties.insert("marker-radius".to_string(), JsonValue::from(style.radius));
        properties.insert("bookmarked".to_string(), JsonValue::from(bookmarked));
    }
    marker
}

fn shape(geometry: &geo::Geometry, label: &str) -> geojson::Feature {
    let mut properties = geojson::JsonObject::new();
    properties.insert("analysis".to_string(), JsonValue::from(label));
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::from(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Renders into GeoJSON files in `output_dir` that any map viewer can display: the visible markers
/// in `visible.geojson` and the current analysis in `analysis.geojson`. Popups and banners go to
/// the terminal.
pub struct GeoJsonRenderer {
    output_dir: PathBuf,
}

impl GeoJsonRenderer {
    pub fn new(output_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Creating output directory {:?}", output_dir))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn visible_filepath(&self) -> PathBuf {
        self.output_dir.join(VISIBLE_FILENAME)
    }

    pub fn analysis_filepath(&self) -> PathBuf {
        self.output_dir.join(ANALYSIS_FILENAME)
    }
}

impl RenderAdapter for GeoJsonRenderer {
    fn redraw(&mut self, visible: &[&Feature], bookmarks: &[FeatureId]) -> anyhow::Result<()> {
        let collection: geojson::FeatureCollection = visible
            .iter()
            .map(|feature| marker(feature, bookmarks.contains(&feature.id)))
            .collect();
        log::debug!("Drawing {} markers", visible.len());
        write_geojson(collection, &self.visible_filepath())
    }

    fn highlight(&mut self, highlight: &Highlight, features: &[&Feature]) -> anyhow::Result<()> {
        let collection: geojson::FeatureCollection = highlight
            .shapes
            .iter()
            .map(|geometry| shape(geometry, &highlight.label))
            .chain(features.iter().map(|feature| marker(feature, false)))
            .collect();
        write_geojson(collection, &self.analysis_filepath())
    }

    fn clear_highlight(&mut self) -> anyhow::Result<()> {
        let filepath = self.analysis_filepath();
        if filepath.exists() {
            fs::remove_file(&filepath).with_context(|| format!("Removing {:?}", filepath))?;
        }
        Ok(())
    }

    fn show_banner(&mut self, banner: &Banner) {
        eprintln!("! {}", banner.message);
    }

    fn set_view(&mut self, view: &MapView) {
        log::info!(
            "View centered on ({:.4}, {:.4}) at zoom {}",
            view.center.lat,
            view.center.lng,
            view.zoom
        );
    }

    fn open_popup(&mut self, feature: &Feature) {
        println!("{}", popup_text(feature));
    }
}

#[cfg(test)]
mod tests {
    use testdir::testdir;

    use crate::feature::{
        feature::{RawCollection, RawFeature},
        geojson::parse_feature_collection,
        store::FeatureStore,
    };

    use super::*;

    fn store() -> FeatureStore {
        let mut store = FeatureStore::new();
        store.load(RawCollection::from(vec![
            RawFeature::point("1", Category::Event, "Fair", 6.45, 3.40)
                .with_description("Food and music"),
            RawFeature::point("2", Category::Vendor, "Stall", 6.46, 3.41),
        ]));
        store
    }

    #[test]
    fn test_every_category_has_a_style() {
        for category in Category::ALL {
            assert!(style_for(category).color.starts_with('#'));
        }
        assert_eq!(10, style_for(Category::Event).radius);
    }

    #[test]
    fn test_popup_text() {
        let store = store();
        assert_eq!(
            "Fair [event]\nFood and music",
            popup_text(store.get("1").unwrap())
        );
        assert_eq!("Stall [vendor]", popup_text(store.get("2").unwrap()));
    }

    #[test]
    fn test_redraw_writes_styled_markers() {
        let store = store();
        let test_dir = testdir!();
        let mut renderer = GeoJsonRenderer::new(&test_dir.join("out")).unwrap();
        let visible: Vec<&Feature> = store.all().iter().collect();
        renderer.redraw(&visible, &["2".to_string()]).unwrap();

        let contents = fs::read_to_string(renderer.visible_filepath()).unwrap();
        let written: JsonValue = serde_json::from_str(&contents).unwrap();
        assert_eq!("#00ff00", written["features"][0]["properties"]["marker-color"]);
        assert_eq!(false, written["features"][0]["properties"]["bookmarked"]);
        assert_eq!(true, written["features"][1]["properties"]["bookmarked"]);

        let mut reloaded = FeatureStore::new();
        reloaded.load(parse_feature_collection(&contents).unwrap());
        assert_eq!(store.all(), reloaded.all());
    }

    #[test]
    fn test_highlight_replaces_previous() {
        let store = store();
        let test_dir = testdir!();
        let mut renderer = GeoJsonRenderer::new(&test_dir).unwrap();
        let first = Highlight {
            label: "nearest".to_string(),
            shapes: vec![geo::Geometry::Point(geo::Point::new(3.4, 6.45))],
        };
        renderer.highlight(&first, &[store.get("1").unwrap()]).unwrap();
        let second = Highlight {
            label: "buffer".to_string(),
            shapes: vec![],
        };
        renderer.highlight(&second, &[]).unwrap();

        let contents = fs::read_to_string(renderer.analysis_filepath()).unwrap();
        let written: JsonValue = serde_json::from_str(&contents).unwrap();
        assert_eq!(0, written["features"].as_array().unwrap().len());

        renderer.clear_highlight().unwrap();
        assert!(!renderer.analysis_filepath().exists());
        renderer.clear_highlight().unwrap();
    }
}
