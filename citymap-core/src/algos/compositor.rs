use crate::{
    constants::{
        CANVAS_SIZE, FEATURE_OPACITY, FETCH_RADIUS_M, METERS_PER_DEGREE, POINT_RADIUS, ROAD_COLOR,
        ROAD_STROKE_WIDTH,
    },
    types::{Canvas, ClassifiedLayer, RoadGraph},
};

use geo::{Coord, Geometry, LineString, Polygon};
use svg::{
    Document,
    node::element::{Circle, Group, Path, path::Data},
};
use tracing::event;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawConfig {
    pub center: Coord<f64>,
    pub radius_m: f64,
    pub canvas_size: u32,
    pub road_color: String,
    pub road_width: f32,
    pub feature_opacity: f32,
    pub point_radius: f32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        DrawConfig {
            center: Coord { x: 0.0, y: 0.0 },
            radius_m: FETCH_RADIUS_M,
            canvas_size: CANVAS_SIZE,
            road_color: ROAD_COLOR.to_string(),
            road_width: ROAD_STROKE_WIDTH,
            feature_opacity: FEATURE_OPACITY,
            point_radius: POINT_RADIUS,
        }
    }
}

impl DrawConfig {
    pub fn centered_at(mut self, center: Coord<f64>, radius_m: f64) -> Self {
        self.center = center;
        self.radius_m = radius_m;
        self
    }
}

/// Local equirectangular projection with one scale for both axes, so the
/// fetch radius spans half the canvas in every direction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Projection {
    origin: Coord<f64>,
    cos_lat: f64,
    pixels_per_meter: f64,
    half_size: f64,
}

impl Projection {
    pub fn new(config: &DrawConfig) -> Self {
        let half_size = config.canvas_size as f64 / 2.0;

        Projection {
            origin: config.center,
            cos_lat: config.center.y.to_radians().cos(),
            pixels_per_meter: half_size / config.radius_m.max(1.0),
            half_size,
        }
    }

    pub fn project(&self, coord: Coord<f64>) -> (f32, f32) {
        let east_m = (coord.x - self.origin.x) * METERS_PER_DEGREE * self.cos_lat;
        let north_m = (coord.y - self.origin.y) * METERS_PER_DEGREE;

        (
            (self.half_size + east_m * self.pixels_per_meter) as f32,
            (self.half_size - north_m * self.pixels_per_meter) as f32,
        )
    }
}

enum Shape {
    Area(Data),
    Line(Data),
    Dot(f32, f32),
}

pub(crate) struct LayerCompositor;

impl LayerCompositor {
    /// Draws roads first, then every paintable layer sorted by family.
    pub fn compose(graph: &RoadGraph, layers: &[ClassifiedLayer], config: &DrawConfig) -> Canvas {
        let projection = Projection::new(config);
        let size = config.canvas_size;

        let mut document = Document::new()
            .set("width", size)
            .set("height", size)
            .set("viewBox", (0, 0, size, size));

        if let Some(roads) = Self::draw_roads(graph, &projection, config) {
            document = document.add(roads);
        }

        let mut ordered = layers.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|layer| layer.kind.draw_rank());

        for layer in ordered {
            if !is_paintable(&layer.color) {
                event!(
                    tracing::Level::DEBUG,
                    "Skipping layer {} with unusable color {:?}",
                    layer.kind,
                    layer.color
                );
                continue;
            }

            if let Some(group) = Self::draw_layer(layer, &projection, config) {
                document = document.add(group);
            }
        }

        Canvas::new(document)
    }

    fn draw_roads(graph: &RoadGraph, projection: &Projection, config: &DrawConfig) -> Option<Group> {
        let mut data = Data::new();
        let mut segments = 0_usize;

        for (from, to) in graph.edge_segments() {
            data = data
                .move_to(projection.project(from))
                .line_to(projection.project(to));
            segments += 1;
        }

        if segments == 0 {
            return None;
        }

        event!(tracing::Level::DEBUG, "Drawing {} road segments", segments);

        let path = Path::new()
            .set("fill", "none")
            .set("stroke", config.road_color.as_str())
            .set("stroke-width", config.road_width)
            .set("stroke-linecap", "round")
            .set("d", data);

        Some(Group::new().set("id", "roads").add(path))
    }

    fn draw_layer(
        layer: &ClassifiedLayer,
        projection: &Projection,
        config: &DrawConfig,
    ) -> Option<Group> {
        let mut shapes = Vec::new();

        for feature in layer.features.iter() {
            if let Some(geometry) = &feature.geometry {
                Self::collect_shapes(geometry, projection, &mut shapes);
            }
        }

        if shapes.is_empty() {
            return None;
        }

        let color = layer.color.as_str();
        let mut group = Group::new().set("id", layer.element_id());

        for shape in shapes {
            group = match shape {
                Shape::Area(data) => group.add(
                    Path::new()
                        .set("fill", color)
                        .set("fill-opacity", config.feature_opacity)
                        .set("fill-rule", "evenodd")
                        .set("stroke", "none")
                        .set("d", data),
                ),
                Shape::Line(data) => group.add(
                    Path::new()
                        .set("fill", "none")
                        .set("stroke", color)
                        .set("stroke-opacity", config.feature_opacity)
                        .set("stroke-width", config.road_width)
                        .set("d", data),
                ),
                Shape::Dot(x, y) => group.add(
                    Circle::new()
                        .set("cx", x)
                        .set("cy", y)
                        .set("r", config.point_radius)
                        .set("fill", color)
                        .set("fill-opacity", config.feature_opacity),
                ),
            };
        }

        Some(group)
    }

    fn collect_shapes(geometry: &Geometry<f64>, projection: &Projection, shapes: &mut Vec<Shape>) {
        match geometry {
            Geometry::Point(point) => {
                let (x, y) = projection.project(point.0);
                shapes.push(Shape::Dot(x, y));
            }
            Geometry::MultiPoint(points) => {
                for point in points.iter() {
                    let (x, y) = projection.project(point.0);
                    shapes.push(Shape::Dot(x, y));
                }
            }
            Geometry::Line(line) => {
                let line = LineString::new(vec![line.start, line.end]);
                shapes.extend(Self::line_data(&line, projection).map(Shape::Line));
            }
            Geometry::LineString(line) => {
                shapes.extend(Self::line_data(line, projection).map(Shape::Line));
            }
            Geometry::MultiLineString(lines) => {
                for line in lines.iter() {
                    shapes.extend(Self::line_data(line, projection).map(Shape::Line));
                }
            }
            Geometry::Polygon(polygon) => {
                shapes.extend(Self::polygon_data(polygon, projection).map(Shape::Area));
            }
            Geometry::MultiPolygon(polygons) => {
                for polygon in polygons.iter() {
                    shapes.extend(Self::polygon_data(polygon, projection).map(Shape::Area));
                }
            }
            Geometry::Rect(rect) => {
                shapes.extend(Self::polygon_data(&rect.to_polygon(), projection).map(Shape::Area));
            }
            Geometry::Triangle(triangle) => {
                shapes.extend(
                    Self::polygon_data(&triangle.to_polygon(), projection).map(Shape::Area),
                );
            }
            Geometry::GeometryCollection(collection) => {
                for geometry in collection.iter() {
                    Self::collect_shapes(geometry, projection, shapes);
                }
            }
        }
    }

    fn line_data(line: &LineString<f64>, projection: &Projection) -> Option<Data> {
        let mut coords = line.0.iter();
        let first = coords.next()?;

        let mut data = Data::new().move_to(projection.project(*first));
        let mut points = 1;

        for coord in coords {
            data = data.line_to(projection.project(*coord));
            points += 1;
        }

        (points >= 2).then_some(data)
    }

    fn polygon_data(polygon: &Polygon<f64>, projection: &Projection) -> Option<Data> {
        let mut data = Data::new();
        let mut rings = 0;

        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            // Closed rings repeat their first coordinate
            if ring.0.len() < 4 {
                continue;
            }

            let mut coords = ring.0.iter().take(ring.0.len() - 1);
            let Some(first) = coords.next() else {
                continue;
            };

            data = data.move_to(projection.project(*first));
            for coord in coords {
                data = data.line_to(projection.project(*coord));
            }
            data = data.close();

            rings += 1;
        }

        (rings > 0).then_some(data)
    }
}

/// Hex colors and plain CSS color names can be painted, anything else is skipped.
pub(crate) fn is_paintable(color: &str) -> bool {
    let color = color.trim();

    if let Some(hex) = color.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }

    !color.is_empty()
        && color != "none"
        && color != "transparent"
        && color.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        document::SvgDocument,
        types::{Feature, LayerKind},
    };

    use geo::{Point, polygon};

    const CENTER: Coord<f64> = Coord {
        x: -46.63,
        y: -23.55,
    };

    fn config() -> DrawConfig {
        DrawConfig::default().centered_at(CENTER, 5000.0)
    }

    fn square_layer(kind: LayerKind, color: &str) -> ClassifiedLayer {
        let mut layer = ClassifiedLayer::new(kind, color);
        layer.features.push(Feature::tagged(
            &[],
            Geometry::Polygon(polygon![
                (x: -46.631, y: -23.551),
                (x: -46.629, y: -23.551),
                (x: -46.629, y: -23.549),
                (x: -46.631, y: -23.549),
            ]),
        ));
        layer
    }

    fn road_graph() -> RoadGraph {
        let mut graph = RoadGraph::new();
        graph.add_way(&[
            (1, Coord { x: -46.64, y: -23.55 }),
            (2, Coord { x: -46.62, y: -23.55 }),
            (3, Coord { x: -46.62, y: -23.54 }),
        ]);
        graph
    }

    fn child_ids(canvas: &Canvas) -> Vec<String> {
        let document = SvgDocument::parse(&canvas.to_svg_string()).unwrap();

        document
            .root()
            .child_elements()
            .filter_map(|element| element.attr("id").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_draw_order_places_roads_and_water_at_the_back() {
        let layers = vec![
            square_layer(LayerKind::Building, "#a9a9a9"),
            square_layer(LayerKind::Residential, "#d3d3d3"),
            square_layer(LayerKind::Park, "#008000"),
            square_layer(LayerKind::Water, "#0000ff"),
            square_layer(LayerKind::Wood, "#006400"),
        ];

        let canvas = LayerCompositor::compose(&road_graph(), &layers, &config());

        assert_eq!(
            child_ids(&canvas),
            vec![
                "roads",
                "layer-water",
                "layer-wood",
                "layer-park",
                "layer-residential",
                "layer-building",
            ]
        );
    }

    #[test]
    fn test_unpaintable_layers_are_skipped() {
        let layers = vec![
            square_layer(LayerKind::Water, ""),
            square_layer(LayerKind::Park, "not a color"),
            square_layer(LayerKind::Building, "#a9a9a9"),
        ];

        let canvas = LayerCompositor::compose(&RoadGraph::new(), &layers, &config());

        assert_eq!(child_ids(&canvas), vec!["layer-building"]);
    }

    #[test]
    fn test_canvas_is_square() {
        let canvas = LayerCompositor::compose(&road_graph(), &[], &config());
        let document = SvgDocument::parse(&canvas.to_svg_string()).unwrap();

        assert_eq!(document.root().attr("width"), Some("720"));
        assert_eq!(document.root().attr("height"), Some("720"));
        assert_eq!(document.root().attr("viewBox"), Some("0 0 720 720"));
    }

    #[test]
    fn test_projection_uses_equal_axis_scale() {
        let projection = Projection::new(&config());

        let meters = 1000.0;
        let east = Coord {
            x: CENTER.x + meters / (METERS_PER_DEGREE * CENTER.y.to_radians().cos()),
            y: CENTER.y,
        };
        let north = Coord {
            x: CENTER.x,
            y: CENTER.y + meters / METERS_PER_DEGREE,
        };

        let (cx, cy) = projection.project(CENTER);
        let (ex, ey) = projection.project(east);
        let (nx, ny) = projection.project(north);

        assert!((cx - 360.0).abs() < 1e-3 && (cy - 360.0).abs() < 1e-3);
        assert!((ey - cy).abs() < 1e-3);
        assert!((nx - cx).abs() < 1e-3);
        assert!(((ex - cx) - (cy - ny)).abs() < 1e-2);
        assert!(((ex - cx) - 72.0).abs() < 1e-2);
    }

    #[test]
    fn test_points_and_lines_are_drawn() {
        let mut layer = ClassifiedLayer::new(LayerKind::Tree, "#008000");
        layer
            .features
            .push(Feature::tagged(&[], Geometry::Point(Point::from(CENTER))));
        layer.features.push(Feature::tagged(
            &[],
            Geometry::LineString(LineString::from(vec![(-46.64, -23.55), (-46.62, -23.55)])),
        ));
        layer.features.push(Feature::new(Default::default(), None));

        let canvas = LayerCompositor::compose(&RoadGraph::new(), &[layer], &config());
        let svg = canvas.to_svg_string();

        assert!(svg.contains("<circle"));
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn test_is_paintable() {
        assert!(is_paintable("#0000ff"));
        assert!(is_paintable("#abc"));
        assert!(is_paintable("darkgreen"));
        assert!(!is_paintable(""));
        assert!(!is_paintable("none"));
        assert!(!is_paintable("#12345"));
        assert!(!is_paintable("rgb(0, 0, 0)"));
    }
}
