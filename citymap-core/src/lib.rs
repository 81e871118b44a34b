mod algos;
mod batch;
mod cleanup;
mod constants;
mod document;
mod error;
mod fetch;
mod input;
#[cfg(feature = "raster")]
mod raster;
mod types;
mod video;

use geo::Coord;
use tracing::{Level, event, span};

pub use algos::{ColorTable, DrawConfig};
pub use batch::{
    BatchState, OutputFormat, ProcessConfig, ProcessOutcome, RenderConfig, RenderPipeline,
    Selection, SelectionPolicy, process_directory, process_file,
};
pub use cleanup::{CleanupTool, NoCleanup, Svgo};
pub use document::{
    Element, LabelStyle, LayerSignatures, Node, Palette, PostProcessOptions, SvgDocument,
    adjust_viewport, flatten_indirection, inject_label, postprocess, relayer,
};
#[cfg(feature = "raster")]
pub use error::RasterError;
pub use error::{CleanupError, DocumentError, FetchError, ItemError, PipelineError};
pub use fetch::{MapDataSource, OverpassConfig, OverpassSource};
pub use input::{DEFAULT_DELIMITER, parse_cities, read_cities};
#[cfg(feature = "raster")]
pub use raster::{RasterOptions, rasterize, save_png};
pub use types::{
    BatchSummary, Canvas, CityIdentity, CityRecord, ClassifiedLayer, Feature, LayerFamily,
    LayerKind, NodeId, RoadEdge, RoadGraph, Tags,
};
pub use video::{VideoConfig, assemble_video, collect_frames, encode_video};

/// Simplifies, classifies and draws the map data of one city centered at `center`.
pub fn render_map(
    graph: &RoadGraph,
    features: Vec<Feature>,
    center: Coord<f64>,
    config: &RenderConfig,
) -> Canvas {
    let span = span!(Level::DEBUG, "render_map");
    let _guard = span.enter();

    let simplified = features
        .into_iter()
        .map(|feature| algos::GeometrySimplifier::simplify_feature(feature, config.tolerance));

    let classifier = algos::FeatureClassifier::new(&config.colors);
    let layers = classifier.classify_all(simplified);

    event!(
        Level::DEBUG,
        "Drawing {} edges and {} layers",
        graph.edge_count(),
        layers.len()
    );

    let draw_config = config.draw.clone().centered_at(center, config.radius_m);

    algos::LayerCompositor::compose(graph, &layers, &draw_config)
}
