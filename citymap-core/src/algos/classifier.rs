use crate::{
    constants::DEFAULT_LAYER_COLORS,
    types::{ClassifiedLayer, Feature, LayerKind},
};

use std::collections::{BTreeMap, HashMap};

// Tag keys in match priority. The first key carrying a recognized value wins.
pub(crate) const TAG_PRIORITY: [(&str, &[LayerKind]); 3] = [
    (
        "natural",
        &[
            LayerKind::Water,
            LayerKind::Wood,
            LayerKind::Grassland,
            LayerKind::Tree,
            LayerKind::Beach,
        ],
    ),
    (
        "leisure",
        &[
            LayerKind::Park,
            LayerKind::Garden,
            LayerKind::Pitch,
            LayerKind::SportsCentre,
        ],
    ),
    (
        "landuse",
        &[
            LayerKind::Forest,
            LayerKind::Meadow,
            LayerKind::RecreationGround,
            LayerKind::Residential,
            LayerKind::Commercial,
        ],
    ),
];

// Any value under this key counts, it is checked after every valued key.
pub(crate) const BUILDING_KEY: &str = "building";

/// Static mapping from layer to raw fill color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    colors: HashMap<LayerKind, String>,
}

impl Default for ColorTable {
    fn default() -> Self {
        let colors = DEFAULT_LAYER_COLORS
            .iter()
            .filter_map(|(name, color)| Some((LayerKind::from_name(name)?, color.to_string())))
            .collect();

        ColorTable { colors }
    }
}

impl ColorTable {
    pub fn empty() -> Self {
        ColorTable {
            colors: HashMap::new(),
        }
    }

    pub fn with_color(mut self, kind: LayerKind, color: &str) -> Self {
        self.colors.insert(kind, color.to_string());
        self
    }

    pub fn without(mut self, kind: LayerKind) -> Self {
        self.colors.remove(&kind);
        self
    }

    pub fn color_of(&self, kind: LayerKind) -> Option<&str> {
        self.colors.get(&kind).map(String::as_str)
    }
}

pub(crate) struct FeatureClassifier<'a> {
    colors: &'a ColorTable,
}

impl<'a> FeatureClassifier<'a> {
    pub fn new(colors: &'a ColorTable) -> Self {
        FeatureClassifier { colors }
    }

    /// Layer of a feature, following the fixed key priority.
    pub fn layer_of(feature: &Feature) -> Option<LayerKind> {
        for (key, kinds) in TAG_PRIORITY.iter() {
            let Some(value) = feature.tag(key) else {
                continue;
            };

            // Unknown values fall through to the next key
            if let Some(kind) = kinds.iter().find(|kind| kind.name() == value) {
                return Some(*kind);
            }
        }

        feature.tag(BUILDING_KEY).map(|_| LayerKind::Building)
    }

    pub fn classify(&self, feature: &Feature) -> Option<(LayerKind, &'a str)> {
        let colors: &'a ColorTable = self.colors;

        let kind = Self::layer_of(feature)?;
        let color = colors.color_of(kind)?;

        Some((kind, color))
    }

    /// Buckets features by layer, returned in draw order.
    pub fn classify_all(&self, features: impl IntoIterator<Item = Feature>) -> Vec<ClassifiedLayer> {
        let mut layers: BTreeMap<_, ClassifiedLayer> = BTreeMap::new();

        for feature in features {
            let Some((kind, color)) = self.classify(&feature) else {
                continue;
            };

            layers
                .entry(kind.draw_rank())
                .or_insert_with(|| ClassifiedLayer::new(kind, color))
                .features
                .push(feature);
        }

        layers.into_values().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use geo::{Geometry, point};

    fn feature(pairs: &[(&str, &str)]) -> Feature {
        Feature::tagged(pairs, Geometry::Point(point!(x: 0.0, y: 0.0)))
    }

    #[test]
    fn test_natural_wins_over_landuse() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let (kind, color) = classifier
            .classify(&feature(&[("natural", "water"), ("landuse", "residential")]))
            .unwrap();

        assert_eq!(kind, LayerKind::Water);
        assert_eq!(color, "#0000ff");
    }

    #[test]
    fn test_first_priority_key_wins_for_all_dual_tags() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let (_, natural_kinds) = TAG_PRIORITY[0];

        for (key, kinds) in TAG_PRIORITY.iter().skip(1) {
            for natural in natural_kinds {
                for other in kinds.iter() {
                    let dual = feature(&[("natural", natural.name()), (*key, other.name())]);

                    assert_eq!(
                        classifier.classify(&dual).map(|(kind, _)| kind),
                        Some(*natural)
                    );
                }
            }
        }
    }

    #[test]
    fn test_leisure_wins_over_landuse() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let classified = classifier.classify(&feature(&[("leisure", "park"), ("landuse", "forest")]));

        assert_eq!(classified.map(|(kind, _)| kind), Some(LayerKind::Park));
    }

    #[test]
    fn test_unknown_value_falls_through_to_next_key() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let classified = classifier.classify(&feature(&[
            ("natural", "scrub"),
            ("leisure", "playground"),
            ("landuse", "meadow"),
        ]));

        assert_eq!(classified.map(|(kind, _)| kind), Some(LayerKind::Meadow));
    }

    #[test]
    fn test_building_is_checked_last() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let building = classifier.classify(&feature(&[("building", "yes"), ("landuse", "commercial")]));
        assert_eq!(building.map(|(kind, _)| kind), Some(LayerKind::Commercial));

        let building = classifier.classify(&feature(&[("building", "house"), ("natural", "peak")]));
        assert_eq!(building.map(|(kind, _)| kind), Some(LayerKind::Building));
    }

    #[test]
    fn test_unmatched_features_are_dropped() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        assert!(classifier.classify(&feature(&[("amenity", "school")])).is_none());
        assert!(classifier.classify(&feature(&[])).is_none());
    }

    #[test]
    fn test_missing_color_drops_feature() {
        let colors = ColorTable::default().without(LayerKind::Water);
        let classifier = FeatureClassifier::new(&colors);

        assert!(classifier.classify(&feature(&[("natural", "water")])).is_none());
    }

    #[test]
    fn test_classify_all_returns_layers_in_draw_order() {
        let colors = ColorTable::default();
        let classifier = FeatureClassifier::new(&colors);

        let layers = classifier.classify_all(vec![
            feature(&[("building", "yes")]),
            feature(&[("landuse", "residential")]),
            feature(&[("leisure", "park")]),
            feature(&[("natural", "wood")]),
            feature(&[("natural", "water")]),
            feature(&[("natural", "water")]),
            feature(&[("shop", "bakery")]),
        ]);

        let kinds = layers.iter().map(|layer| layer.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Water,
                LayerKind::Wood,
                LayerKind::Park,
                LayerKind::Residential,
                LayerKind::Building,
            ]
        );
        assert_eq!(layers[0].features.len(), 2);
    }
}
