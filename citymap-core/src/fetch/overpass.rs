use super::MapDataSource;
use crate::{
    algos::{BUILDING_KEY, TAG_PRIORITY},
    constants::{OVERPASS_TIMEOUT_SECS, OVERPASS_URL},
    error::FetchError,
    types::{Feature, RoadGraph, Tags},
};

use std::{collections::HashMap, time::Duration};

use geo::{Contains, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;
use tracing::{Level, event};

const EXCLUDED_HIGHWAYS: &str = "abandoned|construction|no|planned|platform|proposed|raceway|razed";

#[derive(Debug, Clone, PartialEq)]
pub struct OverpassConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        OverpassConfig {
            url: OVERPASS_URL.to_string(),
            timeout: Duration::from_secs(OVERPASS_TIMEOUT_SECS),
        }
    }
}

/// Map data from an Overpass API endpoint.
pub struct OverpassSource {
    client: reqwest::blocking::Client,
    config: OverpassConfig,
}

impl OverpassSource {
    pub fn new(config: OverpassConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("citymap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Http {
                url: config.url.clone(),
                source,
            })?;

        Ok(OverpassSource { client, config })
    }

    fn request(&self, query: String) -> Result<String, FetchError> {
        let http_error = |source: reqwest::Error| FetchError::Http {
            url: self.config.url.clone(),
            source,
        };

        event!(Level::DEBUG, "Querying {}", self.config.url);

        self.client
            .post(&self.config.url)
            .form(&[("data", query)])
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(http_error)
    }

    fn server_timeout(&self) -> u64 {
        self.config.timeout.as_secs().max(1)
    }
}

impl MapDataSource for OverpassSource {
    fn fetch_road_graph(&self, center: Coord<f64>, radius_m: f64) -> Result<RoadGraph, FetchError> {
        let body = self.request(road_query(center, radius_m, self.server_timeout()))?;
        let graph = parse_road_graph(&body)?;

        if graph.is_empty() {
            return Err(FetchError::EmptyGraph {
                lat: center.y,
                lon: center.x,
                radius_m,
            });
        }

        event!(
            Level::DEBUG,
            "Fetched {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(graph)
    }

    fn fetch_features(&self, center: Coord<f64>, radius_m: f64) -> Result<Vec<Feature>, FetchError> {
        let body = self.request(feature_query(center, radius_m, self.server_timeout()))?;
        let features = parse_features(&body)?;

        event!(Level::DEBUG, "Fetched {} features", features.len());

        Ok(features)
    }
}

fn around(center: Coord<f64>, radius_m: f64) -> String {
    format!("(around:{},{},{})", radius_m, center.y, center.x)
}

pub(crate) fn road_query(center: Coord<f64>, radius_m: f64, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout_secs}];\
        (way[\"highway\"][\"area\"!~\"yes\"][\"highway\"!~\"{EXCLUDED_HIGHWAYS}\"]{};);\
        out body;>;out skel qt;",
        around(center, radius_m)
    )
}

pub(crate) fn feature_query(center: Coord<f64>, radius_m: f64, timeout_secs: u64) -> String {
    let around = around(center, radius_m);

    let mut clauses = TAG_PRIORITY
        .iter()
        .map(|(key, kinds)| {
            let values = kinds.iter().map(|kind| kind.name()).collect::<Vec<_>>();
            format!("nwr[\"{key}\"~\"^({})$\"]{around};", values.join("|"))
        })
        .collect::<Vec<_>>();
    clauses.push(format!("nwr[\"{BUILDING_KEY}\"]{around};"));

    format!(
        "[out:json][timeout:{timeout_secs}];({});out geom;",
        clauses.concat()
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    nodes: Vec<i64>,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
    #[serde(default)]
    members: Vec<OverpassMember>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Deserialize)]
struct OverpassMember {
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for Coord<f64> {
    fn from(value: LatLon) -> Self {
        Coord {
            x: value.lon,
            y: value.lat,
        }
    }
}

fn decode(body: &str) -> Result<OverpassResponse, FetchError> {
    serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))
}

/// Builds the undirected road graph from ways and their referenced nodes.
pub(crate) fn parse_road_graph(body: &str) -> Result<RoadGraph, FetchError> {
    let response = decode(body)?;

    let nodes = response
        .elements
        .iter()
        .filter(|element| element.element_type == "node")
        .filter_map(|element| {
            let coord = Coord {
                x: element.lon?,
                y: element.lat?,
            };
            Some((element.id, coord))
        })
        .collect::<HashMap<_, _>>();

    let mut graph = RoadGraph::new();

    for way in response
        .elements
        .iter()
        .filter(|element| element.element_type == "way")
    {
        let resolved = way
            .nodes
            .iter()
            .filter_map(|id| Some((*id, *nodes.get(id)?)))
            .collect::<Vec<_>>();

        graph.add_way(&resolved);
    }

    Ok(graph)
}

pub(crate) fn parse_features(body: &str) -> Result<Vec<Feature>, FetchError> {
    let response = decode(body)?;

    let features = response
        .elements
        .into_iter()
        .filter(|element| !element.tags.is_empty())
        .filter_map(|element| {
            let geometry = match element.element_type.as_str() {
                "node" => node_geometry(&element),
                "way" => way_geometry(&element.geometry),
                "relation" if element.tags.get("type").is_some_and(|t| t == "multipolygon") => {
                    relation_geometry(&element.members)
                }
                _ => return None,
            };

            Some(Feature::new(element.tags, geometry))
        })
        .collect();

    Ok(features)
}

fn node_geometry(element: &OverpassElement) -> Option<Geometry<f64>> {
    let coord = Coord {
        x: element.lon?,
        y: element.lat?,
    };

    Some(Geometry::Point(Point::from(coord)))
}

fn coords_of(geometry: &[Option<LatLon>]) -> Vec<Coord<f64>> {
    geometry.iter().flatten().map(|point| (*point).into()).collect()
}

fn closed_ring(geometry: &[Option<LatLon>]) -> Option<LineString<f64>> {
    let coords = coords_of(geometry);

    match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() >= 4 && first == last => {
            Some(LineString::new(coords))
        }
        _ => None,
    }
}

// Closed ways are areas, open ways are lines.
fn way_geometry(geometry: &[Option<LatLon>]) -> Option<Geometry<f64>> {
    if let Some(ring) = closed_ring(geometry) {
        return Some(Geometry::Polygon(Polygon::new(ring, vec![])));
    }

    let coords = coords_of(geometry);
    (coords.len() >= 2).then(|| Geometry::LineString(LineString::new(coords)))
}

// Only closed member rings are used, split rings are not stitched together.
fn relation_geometry(members: &[OverpassMember]) -> Option<Geometry<f64>> {
    let rings_with_role = |role: &str| {
        members
            .iter()
            .filter(|member| member.role == role)
            .filter_map(|member| closed_ring(&member.geometry))
            .collect::<Vec<_>>()
    };

    let mut polygons = rings_with_role("outer")
        .into_iter()
        .map(|outer| Polygon::new(outer, vec![]))
        .collect::<Vec<_>>();

    if polygons.is_empty() {
        return None;
    }

    for inner in rings_with_role("inner") {
        let Some(start) = inner.0.first().copied() else {
            continue;
        };

        if let Some(shell) = polygons
            .iter_mut()
            .find(|polygon| polygon.contains(&Point::from(start)))
        {
            shell.interiors_push(inner);
        }
    }

    match polygons.len() {
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ROADS: &str = r#"{
        "version": 0.6,
        "elements": [
            {"type": "way", "id": 100, "nodes": [1, 2, 3], "tags": {"highway": "residential"}},
            {"type": "way", "id": 101, "nodes": [3, 2, 4], "tags": {"highway": "service"}},
            {"type": "way", "id": 102, "nodes": [4, 99], "tags": {"highway": "track"}},
            {"type": "node", "id": 1, "lat": -23.550, "lon": -46.630},
            {"type": "node", "id": 2, "lat": -23.551, "lon": -46.631},
            {"type": "node", "id": 3, "lat": -23.552, "lon": -46.632},
            {"type": "node", "id": 4, "lat": -23.553, "lon": -46.633}
        ]
    }"#;

    const FEATURES: &str = r#"{
        "elements": [
            {"type": "node", "id": 7, "lat": -23.55, "lon": -46.63, "tags": {"natural": "tree"}},
            {"type": "node", "id": 8, "lat": -23.55, "lon": -46.63},
            {"type": "way", "id": 20, "nodes": [1, 2, 3, 1], "tags": {"leisure": "park"},
             "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0},
                          {"lat": 1.0, "lon": 1.0}, {"lat": 0.0, "lon": 0.0}]},
            {"type": "way", "id": 21, "nodes": [4, 5], "tags": {"natural": "water"},
             "geometry": [{"lat": 0.0, "lon": 0.0}, null, {"lat": 0.5, "lon": 0.5}]},
            {"type": "relation", "id": 30, "tags": {"type": "multipolygon", "landuse": "forest"},
             "members": [
                {"type": "way", "ref": 1, "role": "outer",
                 "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 10.0},
                              {"lat": 10.0, "lon": 10.0}, {"lat": 10.0, "lon": 0.0},
                              {"lat": 0.0, "lon": 0.0}]},
                {"type": "way", "ref": 2, "role": "inner",
                 "geometry": [{"lat": 2.0, "lon": 2.0}, {"lat": 2.0, "lon": 3.0},
                              {"lat": 3.0, "lon": 3.0}, {"lat": 2.0, "lon": 2.0}]}
             ]},
            {"type": "relation", "id": 31, "tags": {"type": "route", "route": "bus"}, "members": []}
        ]
    }"#;

    #[test]
    fn test_parse_road_graph() {
        let graph = parse_road_graph(ROADS).unwrap();

        assert_eq!(graph.node_count(), 4);
        // 1-2, 2-3 and 2-4; the reversed 3-2 is the same edge
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(
            graph.node(1),
            Some(Coord {
                x: -46.630,
                y: -23.550
            })
        );
    }

    #[test]
    fn test_parse_features() {
        let features = parse_features(FEATURES).unwrap();

        assert_eq!(features.len(), 4);
        assert!(matches!(features[0].geometry, Some(Geometry::Point(_))));
        assert!(matches!(features[1].geometry, Some(Geometry::Polygon(_))));
        assert!(matches!(features[2].geometry, Some(Geometry::LineString(_))));

        let Some(Geometry::Polygon(forest)) = &features[3].geometry else {
            panic!("relation should become a polygon");
        };
        assert_eq!(forest.interiors().len(), 1);
        assert_eq!(features[3].tag("landuse"), Some("forest"));
    }

    #[test]
    fn test_invalid_json_is_a_decode_error() {
        assert!(matches!(
            parse_features("<html>rate limited</html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_queries_use_radius_around_center() {
        let center = Coord {
            x: -46.63,
            y: -23.55,
        };

        let roads = road_query(center, 5000.0, 180);
        assert!(roads.starts_with("[out:json][timeout:180];"));
        assert!(roads.contains("(around:5000,-23.55,-46.63)"));
        assert!(roads.contains("raceway"));

        let features = feature_query(center, 5000.0, 180);
        assert!(features.contains("nwr[\"natural\"~\"^(water|wood|grassland|tree|beach)$\"]"));
        assert!(features.contains("nwr[\"building\"](around:5000,-23.55,-46.63);"));
        assert!(features.ends_with("out geom;"));
    }
}
