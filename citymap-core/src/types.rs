use crate::error::DocumentError;

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{Display, Formatter},
    hash::Hash,
    io,
    path::Path,
};

use geo::{Coord, Geometry};
use serde::Deserialize;

/// One row of the city table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CityRecord {
    #[serde(alias = "uf")]
    pub region_code: String,
    #[serde(alias = "municipio")]
    pub place_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityRecord {
    pub fn new(region_code: &str, place_name: &str, latitude: f64, longitude: f64) -> Self {
        CityRecord {
            region_code: region_code.to_string(),
            place_name: place_name.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    pub fn identity(&self) -> String {
        format!(
            "{}_{}",
            sanitize_file_part(&self.place_name),
            sanitize_file_part(&self.region_code)
        )
    }

    pub fn output_file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.identity(), extension)
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.place_name.trim(), self.region_code.trim())
    }
}

impl Display for CityRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.place_name, self.region_code)
    }
}

fn sanitize_file_part(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "-")
}

/// Place and region recovered from an output file stem such as `Example_City_SP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityIdentity {
    pub place_name: String,
    pub region_code: String,
}

impl CityIdentity {
    pub fn from_file_stem(stem: &str) -> Result<Self, DocumentError> {
        let Some((place, region)) = stem.rsplit_once('_') else {
            return Err(DocumentError::MalformedName(stem.to_string()));
        };

        if place.is_empty() || region.is_empty() {
            return Err(DocumentError::MalformedName(stem.to_string()));
        }

        Ok(CityIdentity {
            place_name: place.replace('_', " "),
            region_code: region.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| DocumentError::MalformedName(path.display().to_string()))?;

        Self::from_file_stem(stem)
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.place_name, self.region_code)
    }
}

impl Display for CityIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.place_name, self.region_code)
    }
}

pub type Tags = BTreeMap<String, String>;

/// A tagged shape returned by the map data source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub tags: Tags,
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    pub fn new(tags: Tags, geometry: Option<Geometry<f64>>) -> Self {
        Feature { tags, geometry }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub fn tagged(pairs: &[(&str, &str)], geometry: Geometry<f64>) -> Self {
        let tags = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Feature::new(tags, Some(geometry))
    }
}

pub type NodeId = i64;

#[derive(Debug, Clone, Copy)]
pub struct RoadEdge {
    pub from: NodeId,
    pub to: NodeId,
}

impl RoadEdge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        RoadEdge { from, to }
    }

    fn normalized(&self) -> (NodeId, NodeId) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

// Edges are undirected, so equality, hashing and ordering all go through
// the normalized endpoint pair.
impl PartialEq for RoadEdge {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for RoadEdge {}

impl Hash for RoadEdge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl PartialOrd for RoadEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RoadEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}

impl Display for RoadEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {}", self.from, self.to)
    }
}

/// Undirected road network around a city center.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadGraph {
    nodes: HashMap<NodeId, Coord<f64>>,
    edges: BTreeSet<RoadEdge>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: NodeId, coord: Coord<f64>) {
        self.nodes.insert(id, coord);
    }

    /// Returns `false` when the edge was a self loop or already present.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return false;
        }

        self.edges.insert(RoadEdge::new(from, to))
    }

    /// Adds every node of a way and connects consecutive nodes.
    pub fn add_way(&mut self, nodes: &[(NodeId, Coord<f64>)]) {
        for (id, coord) in nodes {
            self.add_node(*id, *coord);
        }

        for pair in nodes.windows(2) {
            self.add_edge(pair[0].0, pair[1].0);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<Coord<f64>> {
        self.nodes.get(&id).copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = &RoadEdge> {
        self.edges.iter()
    }

    /// Edges with both endpoints resolved to coordinates.
    pub fn edge_segments(&self) -> impl Iterator<Item = (Coord<f64>, Coord<f64>)> + '_ {
        self.edges
            .iter()
            .filter_map(|edge| Some((self.node(edge.from)?, self.node(edge.to)?)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Semantic group of layers; declaration order is the back-to-front draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerFamily {
    Water,
    Vegetation,
    Recreation,
    LandUse,
    Building,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Water,
    Beach,
    Wood,
    Grassland,
    Tree,
    Forest,
    Meadow,
    Park,
    Garden,
    Pitch,
    SportsCentre,
    RecreationGround,
    Residential,
    Commercial,
    Building,
}

impl LayerKind {
    pub const ALL: [LayerKind; 15] = [
        LayerKind::Water,
        LayerKind::Beach,
        LayerKind::Wood,
        LayerKind::Grassland,
        LayerKind::Tree,
        LayerKind::Forest,
        LayerKind::Meadow,
        LayerKind::Park,
        LayerKind::Garden,
        LayerKind::Pitch,
        LayerKind::SportsCentre,
        LayerKind::RecreationGround,
        LayerKind::Residential,
        LayerKind::Commercial,
        LayerKind::Building,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Water => "water",
            LayerKind::Beach => "beach",
            LayerKind::Wood => "wood",
            LayerKind::Grassland => "grassland",
            LayerKind::Tree => "tree",
            LayerKind::Forest => "forest",
            LayerKind::Meadow => "meadow",
            LayerKind::Park => "park",
            LayerKind::Garden => "garden",
            LayerKind::Pitch => "pitch",
            LayerKind::SportsCentre => "sports_centre",
            LayerKind::RecreationGround => "recreation_ground",
            LayerKind::Residential => "residential",
            LayerKind::Commercial => "commercial",
            LayerKind::Building => "building",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn family(&self) -> LayerFamily {
        match self {
            LayerKind::Water | LayerKind::Beach => LayerFamily::Water,
            LayerKind::Wood
            | LayerKind::Grassland
            | LayerKind::Tree
            | LayerKind::Forest
            | LayerKind::Meadow => LayerFamily::Vegetation,
            LayerKind::Park
            | LayerKind::Garden
            | LayerKind::Pitch
            | LayerKind::SportsCentre
            | LayerKind::RecreationGround => LayerFamily::Recreation,
            LayerKind::Residential | LayerKind::Commercial => LayerFamily::LandUse,
            LayerKind::Building => LayerFamily::Building,
        }
    }

    /// Position in the z-order, lower is drawn first.
    pub fn draw_rank(&self) -> (LayerFamily, LayerKind) {
        (self.family(), *self)
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named, colored bucket of features drawn at one z-position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedLayer {
    pub kind: LayerKind,
    pub color: String,
    pub features: Vec<Feature>,
}

impl ClassifiedLayer {
    pub fn new(kind: LayerKind, color: &str) -> Self {
        ClassifiedLayer {
            kind,
            color: color.to_string(),
            features: Vec::new(),
        }
    }

    pub fn element_id(&self) -> String {
        format!("layer-{}", self.kind.name())
    }
}

/// The composed map of a single city.
#[derive(Debug, Clone)]
pub struct Canvas {
    document: svg::Document,
}

impl Canvas {
    pub(crate) fn new(document: svg::Document) -> Self {
        Canvas { document }
    }

    pub fn document(&self) -> &svg::Document {
        &self.document
    }

    pub fn to_svg_string(&self) -> String {
        self.document.to_string()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        svg::save(path, &self.document)
    }
}

/// Outcome counters of one batch stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.failed
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_output_file_name_from_city() {
        let city = CityRecord::new("SP", "Example City", -23.55, -46.63);

        assert_eq!(city.output_file_name("svg"), "Example_City_SP.svg");
        assert_eq!(city.label(), "Example City, SP");
    }

    #[test]
    fn test_output_file_name_strips_separators() {
        let city = CityRecord::new("RJ", "  Rio  de/Janeiro ", 0.0, 0.0);

        assert_eq!(city.identity(), "Rio_de-Janeiro_RJ");
    }

    #[test]
    fn test_identity_from_file_stem() {
        let identity = CityIdentity::from_file_stem("Example_City_SP").unwrap();

        assert_eq!(identity.place_name, "Example City");
        assert_eq!(identity.region_code, "SP");
        assert_eq!(identity.label(), "Example City, SP");
    }

    #[test]
    fn test_identity_rejects_malformed_stems() {
        assert!(CityIdentity::from_file_stem("NoRegion").is_err());
        assert!(CityIdentity::from_file_stem("_SP").is_err());
        assert!(CityIdentity::from_file_stem("Campinas_").is_err());
    }

    #[test]
    fn test_road_edges_are_undirected() {
        let mut graph = RoadGraph::new();
        graph.add_node(1, Coord { x: 0.0, y: 0.0 });
        graph.add_node(2, Coord { x: 1.0, y: 0.0 });

        assert!(graph.add_edge(1, 2));
        assert!(!graph.add_edge(2, 1));
        assert!(!graph.add_edge(2, 2));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(RoadEdge::new(1, 2), RoadEdge::new(2, 1));
    }

    #[test]
    fn test_road_graph_from_way() {
        let mut graph = RoadGraph::new();
        graph.add_way(&[
            (10, Coord { x: 0.0, y: 0.0 }),
            (11, Coord { x: 0.0, y: 1.0 }),
            (12, Coord { x: 1.0, y: 1.0 }),
            (10, Coord { x: 0.0, y: 0.0 }),
        ]);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_segments().count(), 3);
    }

    #[test]
    fn test_layer_draw_rank_follows_families() {
        let mut kinds = LayerKind::ALL.to_vec();
        kinds.reverse();
        kinds.sort_by_key(LayerKind::draw_rank);

        assert_eq!(kinds.first(), Some(&LayerKind::Water));
        assert_eq!(kinds.last(), Some(&LayerKind::Building));

        let families = kinds.iter().map(LayerKind::family).collect::<Vec<_>>();
        let mut sorted = families.clone();
        sorted.sort();
        assert_eq!(families, sorted);
    }

    #[test]
    fn test_layer_kind_names_round_trip() {
        for kind in LayerKind::ALL {
            assert_eq!(LayerKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(LayerKind::from_name("parking"), None);
    }
}
