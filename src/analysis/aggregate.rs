use std::collections::HashMap;

use geohash::{decode, encode, Coord};

use crate::feature::feature::{Feature, FeatureId, LatLng};

/// Features grouped into one geohash cell at the current zoom level.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub geohash: String,
    /// Mean position of the members.
    pub center: LatLng,
    pub feature_ids: Vec<FeatureId>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatCell {
    pub geohash: String,
    /// Center of the geohash cell.
    pub center: LatLng,
    pub count: usize,
    /// `count` relative to the densest cell, in (0, 1].
    pub weight: f64,
}

/// Geohash length used to group markers at a map zoom level. Higher zoom, finer cells.
pub fn precision_for_zoom(zoom: u8) -> usize {
    match zoom {
        0..=3 => 2,
        4..=6 => 3,
        7..=9 => 4,
        10..=12 => 5,
        13..=15 => 6,
        _ => 7,
    }
}

fn geohash_of(feature: &Feature, precision: usize) -> anyhow::Result<String> {
    let coord = Coord {
        x: feature.longitude,
        y: feature.latitude,
    };
    Ok(encode(coord, precision)?)
}

/// Group features by the geohash cell they fall into. Cells are ordered by first appearance, and
/// members keep the order of `features`.
fn group_by_cell<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    precision: usize,
) -> anyhow::Result<Vec<(String, Vec<&'a Feature>)>> {
    let mut cell_indices: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<(String, Vec<&'a Feature>)> = Vec::new();
    for feature in features {
        let geohash = geohash_of(feature, precision)?;
        match cell_indices.get(&geohash) {
            Some(&index) => cells[index].1.push(feature),
            None => {
                cell_indices.insert(geohash.clone(), cells.len());
                cells.push((geohash, vec![feature]));
            }
        }
    }
    Ok(cells)
}

pub fn cluster<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    zoom: u8,
) -> anyhow::Result<Vec<Cluster>> {
    let cells = group_by_cell(features, precision_for_zoom(zoom))?;
    Ok(cells
        .into_iter()
        .map(|(geohash, members)| {
            let count = members.len() as f64;
            let center = LatLng::new(
                members.iter().map(|f| f.latitude).sum::<f64>() / count,
                members.iter().map(|f| f.longitude).sum::<f64>() / count,
            );
            Cluster {
                geohash,
                center,
                feature_ids: members.iter().map(|f| f.id.clone()).collect(),
            }
        })
        .collect())
}

pub fn heat_cells<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    precision: usize,
) -> anyhow::Result<Vec<HeatCell>> {
    let cells = group_by_cell(features, precision)?;
    let max_count = cells
        .iter()
        .map(|(_, members)| members.len())
        .max()
        .unwrap_or(0);

    cells
        .into_iter()
        .map(|(geohash, members)| -> anyhow::Result<HeatCell> {
            let (center, _, _) = decode(&geohash)?;
            Ok(HeatCell {
                center: LatLng::new(center.y, center.x),
                count: members.len(),
                weight: members.len() as f64 / max_count as f64,
                geohash,
            })
        })
        .collect()
}
