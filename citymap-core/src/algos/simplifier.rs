use crate::types::Feature;

use geo::{
    Area, Contains, Coord, Geometry, GeometryCollection, Line, LineString, MultiLineString,
    MultiPolygon, Point, Polygon, Simplify,
    algorithm::line_intersection::{LineIntersection, line_intersection},
};

pub(crate) struct GeometrySimplifier;

impl GeometrySimplifier {
    /// Douglas-Peucker simplification that never changes the topology of
    /// the input: rings that would collapse, flip, self-intersect or cross a
    /// sibling ring are kept as they were.
    pub fn simplify(geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
        if tolerance <= 0.0 || !tolerance.is_finite() {
            return geometry.clone();
        }

        match geometry {
            Geometry::LineString(line) => {
                Geometry::LineString(Self::simplify_line_string(line, tolerance))
            }
            Geometry::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
                lines
                    .0
                    .iter()
                    .map(|line| Self::simplify_line_string(line, tolerance))
                    .collect(),
            )),
            Geometry::Polygon(polygon) => {
                Geometry::Polygon(Self::simplify_polygon(polygon, tolerance))
            }
            Geometry::MultiPolygon(polygons) => {
                Geometry::MultiPolygon(Self::simplify_multi_polygon(polygons, tolerance))
            }
            Geometry::GeometryCollection(collection) => {
                Geometry::GeometryCollection(GeometryCollection(
                    collection
                        .0
                        .iter()
                        .map(|geometry| Self::simplify(geometry, tolerance))
                        .collect(),
                ))
            }
            other => other.clone(),
        }
    }

    pub fn simplify_feature(feature: Feature, tolerance: f64) -> Feature {
        let geometry = feature
            .geometry
            .as_ref()
            .map(|geometry| Self::simplify(geometry, tolerance));

        Feature::new(feature.tags, geometry)
    }

    fn simplify_line_string(line: &LineString<f64>, tolerance: f64) -> LineString<f64> {
        if line.0.len() < 3 {
            return line.clone();
        }

        let simplified = line.simplify(&tolerance);

        if simplified.0.len() < 2 {
            return line.clone();
        }

        // Only guard against crossings introduced by the simplification
        if Self::is_simple_path(&line.0, line.is_closed())
            && !Self::is_simple_path(&simplified.0, simplified.is_closed())
        {
            return line.clone();
        }

        simplified
    }

    fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
        let mut rings: Vec<LineString<f64>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .cloned()
            .collect();

        for idx in 0..rings.len() {
            let Some(candidate) = Self::simplify_ring(&rings[idx], tolerance) else {
                continue;
            };

            let crosses_sibling = rings
                .iter()
                .enumerate()
                .any(|(other, ring)| other != idx && Self::rings_touch(&candidate, ring));
            if crosses_sibling {
                continue;
            }

            // Holes must stay inside the shell and the shell around every hole.
            let encloses_holes = if idx == 0 {
                rings
                    .iter()
                    .skip(1)
                    .all(|hole| Self::ring_inside(hole, &candidate))
            } else {
                Self::ring_inside(&candidate, &rings[0])
            };
            if !encloses_holes {
                continue;
            }

            rings[idx] = candidate;
        }

        let mut rings = rings.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));

        Polygon::new(exterior, rings.collect())
    }

    // Members may share edges, but a simplified member never overlaps a
    // sibling it did not overlap before.
    fn simplify_multi_polygon(polygons: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
        let mut members = polygons.0.clone();

        for idx in 0..members.len() {
            let candidate = Self::simplify_polygon(&members[idx], tolerance);
            if candidate == members[idx] {
                continue;
            }

            let overlaps_sibling = members.iter().enumerate().any(|(other, sibling)| {
                other != idx
                    && !Self::polygons_overlap(&members[idx], sibling)
                    && Self::polygons_overlap(&candidate, sibling)
            });
            if !overlaps_sibling {
                members[idx] = candidate;
            }
        }

        MultiPolygon::new(members)
    }

    fn simplify_ring(ring: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
        if !ring.is_closed() || ring.0.len() < 5 {
            return None;
        }

        let original_area = ring_area(ring);
        if original_area == 0.0 || !Self::is_simple_path(&ring.0, true) {
            return None;
        }

        let simplified = ring.simplify(&tolerance);
        if simplified.0.len() == ring.0.len() || simplified.0.len() < 4 {
            return None;
        }

        let area = ring_area(&simplified);
        if area == 0.0 || area.signum() != original_area.signum() {
            return None;
        }

        if !Self::is_simple_path(&simplified.0, true) {
            return None;
        }

        Some(simplified)
    }

    /// `true` when no two non-adjacent segments intersect and no two adjacent
    /// segments overlap.
    pub(crate) fn is_simple_path(coords: &[Coord<f64>], closed: bool) -> bool {
        let segments = coords
            .windows(2)
            .map(|pair| Line::new(pair[0], pair[1]))
            .collect::<Vec<_>>();
        let count = segments.len();

        for i in 0..count {
            for j in (i + 1)..count {
                let adjacent = j == i + 1 || (closed && i == 0 && j == count - 1);

                match line_intersection(segments[i], segments[j]) {
                    None => {}
                    Some(LineIntersection::Collinear { .. }) => return false,
                    Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                    Some(LineIntersection::SinglePoint { .. }) => return false,
                }
            }
        }

        true
    }

    fn rings_touch(a: &LineString<f64>, b: &LineString<f64>) -> bool {
        a.lines()
            .any(|line_a| b.lines().any(|line_b| line_intersection(line_a, line_b).is_some()))
    }

    fn polygons_overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
        let crossing = a.exterior().lines().any(|line_a| {
            b.exterior().lines().any(|line_b| {
                matches!(
                    line_intersection(line_a, line_b),
                    Some(LineIntersection::SinglePoint { is_proper: true, .. })
                )
            })
        });

        crossing
            || a.exterior().0.iter().any(|coord| b.contains(&Point::from(*coord)))
            || b.exterior().0.iter().any(|coord| a.contains(&Point::from(*coord)))
    }

    fn ring_inside(inner: &LineString<f64>, outer: &LineString<f64>) -> bool {
        let shell = Polygon::new(outer.clone(), vec![]);

        inner
            .0
            .iter()
            .any(|coord| shell.contains(&Point::from(*coord)))
    }
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).signed_area()
}
