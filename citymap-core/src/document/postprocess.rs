use super::{Element, Node, Palette, SvgDocument};
use crate::constants::{
    LABEL_FILL, LABEL_FONT_FAMILY, LABEL_MAX_FONT_SIZE, LABEL_MAX_LENGTH, LABEL_MIN_FONT_SIZE,
    LABEL_MIN_LENGTH, LABEL_STROKE, LABEL_STROKE_WIDTH, ROAD_COLOR, VIEWPORT_ZOOM, WATER_COLOR,
};

use std::collections::HashSet;

use tracing::{Level, event, span};

// Never searched when relayering.
const PAINT_CONTAINERS: [&str; 6] = ["defs", "clipPath", "mask", "marker", "pattern", "symbol"];

// Stay ahead of anything moved to the back.
const LEADING_ELEMENTS: [&str; 5] = ["defs", "style", "metadata", "title", "desc"];

#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub min_length: usize,
    pub max_length: usize,
    pub min_font_size: f64,
    pub max_font_size: f64,
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
    pub font_family: String,
}

impl Default for LabelStyle {
    fn default() -> Self {
        LabelStyle {
            min_length: LABEL_MIN_LENGTH,
            max_length: LABEL_MAX_LENGTH,
            min_font_size: LABEL_MIN_FONT_SIZE,
            max_font_size: LABEL_MAX_FONT_SIZE,
            fill: LABEL_FILL.to_string(),
            stroke: LABEL_STROKE.to_string(),
            stroke_width: LABEL_STROKE_WIDTH,
            font_family: LABEL_FONT_FAMILY.to_string(),
        }
    }
}

impl LabelStyle {
    /// Shorter labels get larger text, clamped at both thresholds.
    pub fn font_size_for(&self, length: usize) -> f64 {
        if length <= self.min_length {
            return self.max_font_size;
        }

        if length >= self.max_length {
            return self.min_font_size;
        }

        let progress =
            (length - self.min_length) as f64 / (self.max_length - self.min_length) as f64;

        self.max_font_size - (self.max_font_size - self.min_font_size) * progress
    }
}

/// Paint values identifying water fills and street strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSignatures {
    pub water_fills: Vec<String>,
    pub street_strokes: Vec<String>,
}

impl Default for LayerSignatures {
    fn default() -> Self {
        LayerSignatures {
            water_fills: vec![WATER_COLOR.to_string(), "#00f".to_string(), "blue".to_string()],
            street_strokes: vec![ROAD_COLOR.to_string(), "#000".to_string(), "black".to_string()],
        }
    }
}

impl LayerSignatures {
    fn matches(signatures: &[String], value: Option<&str>) -> bool {
        value.is_some_and(|value| {
            signatures
                .iter()
                .any(|signature| signature.eq_ignore_ascii_case(value.trim()))
        })
    }

    fn is_water(&self, element: &Element) -> bool {
        Self::matches(&self.water_fills, element.paint("fill"))
    }

    fn is_street(&self, element: &Element) -> bool {
        Self::matches(&self.street_strokes, element.paint("stroke"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessOptions {
    pub zoom: f64,
    pub signatures: LayerSignatures,
    pub label: LabelStyle,
    pub palette: Palette,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        PostProcessOptions {
            zoom: VIEWPORT_ZOOM,
            signatures: LayerSignatures::default(),
            label: LabelStyle::default(),
            palette: Palette::default(),
        }
    }
}

/// Runs every rewrite in order and returns the final, recolored markup.
pub fn postprocess(document: &mut SvgDocument, title: &str, options: &PostProcessOptions) -> String {
    let span = span!(Level::DEBUG, "postprocess");
    let _guard = span.enter();

    let resized = adjust_viewport(document, options.zoom);
    let flattened = flatten_indirection(document);
    let relayered = relayer(document, &options.signatures);
    let labeled = inject_label(document, title, &options.label);

    let (markup, recolored) = options.palette.apply_counted(&document.to_string());

    event!(
        Level::DEBUG,
        "Post-processed {title}: viewport {resized}, removed {flattened}, moved {relayered}, labels {labeled}, recolored {recolored}"
    );

    markup
}

/// Shrinks the viewBox around its center by `zoom` and drops the explicit size.
pub fn adjust_viewport(document: &mut SvgDocument, zoom: f64) -> usize {
    let root = document.root_mut();
    let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };

    let view_box = root.attr("viewBox").and_then(parse_view_box).or_else(|| {
        let width = root.attr("width").and_then(parse_length)?;
        let height = root.attr("height").and_then(parse_length)?;

        Some([0.0, 0.0, width, height])
    });

    let removed_width = root.remove_attr("width").is_some();
    let removed_height = root.remove_attr("height").is_some();

    let Some([x, y, width, height]) = view_box else {
        return usize::from(removed_width || removed_height);
    };

    let zoomed_width = width / zoom;
    let zoomed_height = height / zoom;

    root.set_attr(
        "viewBox",
        format!(
            "{} {} {} {}",
            format_number(x + (width - zoomed_width) / 2.0),
            format_number(y + (height - zoomed_height) / 2.0),
            format_number(zoomed_width),
            format_number(zoomed_height),
        ),
    );

    1
}

/// Removes reuse references, the groups holding them and their definitions.
pub fn flatten_indirection(document: &mut SvgDocument) -> usize {
    let root = document.root_mut();
    let mut references = HashSet::new();

    let mut removed = remove_elements(root, &mut references, &|element| {
        element.name == "g" && element.child_elements().any(|child| child.name == "use")
    });
    removed += remove_elements(root, &mut references, &|element| element.name == "use");
    removed += remove_elements(root, &mut references, &|element| element.name == "symbol");
    removed += prune_definitions(root, &references);

    removed
}

/// Moves water fills to the back and street strokes to the front.
pub fn relayer(document: &mut SvgDocument, signatures: &LayerSignatures) -> usize {
    let root = document.root_mut();

    let mut water = Vec::new();
    extract_matching(root, &|element| signatures.is_water(element), &[], &mut water);

    let mut streets = Vec::new();
    extract_matching(root, &|element| signatures.is_street(element), &[], &mut streets);

    let moved = water.len() + streets.len();

    let back = root
        .children
        .iter()
        .position(|node| match node {
            Node::Element(element) => !LEADING_ELEMENTS.contains(&element.name.as_str()),
            _ => false,
        })
        .unwrap_or(root.children.len());

    let rest = root.children.split_off(back);
    root.children.extend(water.into_iter().map(Node::Element));
    root.children.extend(rest);
    root.children.extend(streets.into_iter().map(Node::Element));

    moved
}

/// Appends a centered, outlined title above everything else.
pub fn inject_label(document: &mut SvgDocument, title: &str, style: &LabelStyle) -> usize {
    let title = title.trim();
    if title.is_empty() {
        return 0;
    }

    let font_size = style.font_size_for(title.chars().count());

    let label = Element::new("text")
        .with_attr("x", "50%")
        .with_attr("y", "50%")
        .with_attr("text-anchor", "middle")
        .with_attr("dominant-baseline", "middle")
        .with_attr("font-family", &style.font_family)
        .with_attr("font-size", format_number(font_size))
        .with_attr("fill", &style.fill)
        .with_attr("stroke", &style.stroke)
        .with_attr("stroke-width", format_number(style.stroke_width))
        .with_attr("paint-order", "stroke")
        .with_text(title);

    document.root_mut().children.push(Node::Element(label));

    1
}

// Drops the outermost matches, recording the ids referenced by removed `<use>`.
fn remove_elements(
    parent: &mut Element,
    references: &mut HashSet<String>,
    predicate: &dyn Fn(&Element) -> bool,
) -> usize {
    let mut removed = 0;

    for node in std::mem::take(&mut parent.children) {
        match node {
            Node::Element(element) if predicate(&element) => {
                collect_references(&element, references);
                removed += 1;
            }
            Node::Element(mut element) => {
                removed += remove_elements(&mut element, references, predicate);
                parent.children.push(Node::Element(element));
            }
            other => parent.children.push(other),
        }
    }

    removed
}

fn collect_references(element: &Element, references: &mut HashSet<String>) {
    if element.name == "use" {
        let href = element.attr("href").or_else(|| element.attr("xlink:href"));

        if let Some(id) = href.and_then(|href| href.strip_prefix('#')) {
            references.insert(id.to_string());
        }
    }

    for child in element.child_elements() {
        collect_references(child, references);
    }
}

fn prune_definitions(parent: &mut Element, references: &HashSet<String>) -> usize {
    let mut removed = 0;

    for node in std::mem::take(&mut parent.children) {
        let Node::Element(mut element) = node else {
            parent.children.push(node);
            continue;
        };

        if element.name == "defs" {
            let before = element.children.len();
            element.children.retain(|child| match child {
                Node::Element(definition) => !definition
                    .attr("id")
                    .is_some_and(|id| references.contains(id)),
                _ => true,
            });
            removed += before - element.children.len();

            if !element.has_child_elements() {
                removed += 1;
                continue;
            }
        } else {
            removed += prune_definitions(&mut element, references);
        }

        parent.children.push(Node::Element(element));
    }

    removed
}

// Hoisted elements keep the transforms of the groups they leave.
fn extract_matching(
    parent: &mut Element,
    predicate: &dyn Fn(&Element) -> bool,
    transforms: &[String],
    extracted: &mut Vec<Element>,
) {
    for node in std::mem::take(&mut parent.children) {
        match node {
            Node::Element(element) if PAINT_CONTAINERS.contains(&element.name.as_str()) => {
                parent.children.push(Node::Element(element));
            }
            Node::Element(mut element) if predicate(&element) => {
                let mut chain = transforms.to_vec();
                chain.extend(element.attr("transform").map(str::to_string));

                if !chain.is_empty() {
                    element.set_attr("transform", chain.join(" "));
                }

                extracted.push(element);
            }
            Node::Element(mut element) => {
                let mut chain = transforms.to_vec();
                chain.extend(element.attr("transform").map(str::to_string));

                extract_matching(&mut element, predicate, &chain, extracted);
                parent.children.push(Node::Element(element));
            }
            other => parent.children.push(other),
        }
    }
}

fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let numbers = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;

    match numbers.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => Some([*x, *y, *width, *height]),
        _ => None,
    }
}

// Absolute lengths only, a percentage cannot seed a viewBox.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.trim_end_matches(|c: char| c.is_ascii_alphabetic());

    if number.len() != value.len() && !value.ends_with("px") && !value.ends_with("pt") {
        return None;
    }

    number.parse::<f64>().ok().filter(|length| *length > 0.0)
}

fn format_number(value: f64) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');

    match trimmed {
        "-0" => "0".to_string(),
        _ => trimmed.to_string(),
    }
}
