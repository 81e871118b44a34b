/*!
   Module `batch` drives whole runs: rendering a city table into vector maps, and
   post-processing a directory of rendered maps on a bounded worker pool.
*/

mod process;
mod state;

pub use process::{
    OutputFormat, ProcessConfig, ProcessOutcome, Selection, SelectionPolicy, process_directory,
    process_file,
};
pub use state::BatchState;

use crate::{
    algos::{ColorTable, DrawConfig},
    cleanup::CleanupTool,
    constants::{FETCH_RADIUS_M, PARTIAL_SUFFIX, SIMPLIFY_TOLERANCE_DEG},
    document::{PostProcessOptions, SvgDocument, postprocess},
    error::{ItemError, PipelineError},
    fetch::MapDataSource,
    render_map,
    types::{BatchSummary, CityRecord},
};

use std::{fs, io, path::Path};

use tracing::{Level, event, span};

const VECTOR_EXTENSION: &str = "svg";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub radius_m: f64,
    pub tolerance: f64,
    pub draw: DrawConfig,
    pub colors: ColorTable,
    /// Post-process each map before writing it.
    pub postprocess: Option<PostProcessOptions>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            radius_m: FETCH_RADIUS_M,
            tolerance: SIMPLIFY_TOLERANCE_DEG,
            draw: DrawConfig::default(),
            colors: ColorTable::default(),
            postprocess: None,
        }
    }
}

/// Sequential fetch and render stage over a city table.
pub struct RenderPipeline<S, C>
where
    S: MapDataSource,
    C: CleanupTool,
{
    source: S,
    cleanup: C,
    config: RenderConfig,
}

impl<S, C> RenderPipeline<S, C>
where
    S: MapDataSource,
    C: CleanupTool,
{
    pub fn new(source: S, cleanup: C, config: RenderConfig) -> Self {
        Self {
            source,
            cleanup,
            config,
        }
    }

    /// Renders every city without an existing output, in input order.
    ///
    /// # Errors
    ///
    /// - [PipelineError::Io] when the output directory cannot be created or listed.
    ///
    /// Failures of single cities are logged and counted, never returned.
    pub fn run(&self, cities: &[CityRecord], output_dir: &Path) -> Result<BatchSummary, PipelineError> {
        let span = span!(Level::DEBUG, "render_batch");
        let _guard = span.enter();

        fs::create_dir_all(output_dir).map_err(|err| PipelineError::io(output_dir, err))?;
        let mut state = BatchState::scan(output_dir, VECTOR_EXTENSION)?;

        let mut summary = BatchSummary::default();

        for city in cities {
            let output = output_dir.join(city.output_file_name(VECTOR_EXTENSION));

            event!(Level::INFO, "Processing {}", city);

            if state.contains(&output) {
                event!(Level::INFO, "Already processed: {}", output.display());
                summary.skipped += 1;
                continue;
            }

            match self.render_city(city, &output) {
                Ok(()) => {
                    event!(Level::INFO, "Saved: {}", output.display());
                    state.record(output);
                    summary.processed += 1;
                }
                Err(err) => {
                    event!(Level::ERROR, "Failed to process {}: {}", city, err);
                    summary.failed += 1;
                }
            }
        }

        event!(Level::INFO, "Rendered {} cities: {}", summary.total(), summary);
        event!(Level::INFO, "Done!");

        Ok(summary)
    }

    fn render_city(&self, city: &CityRecord, output: &Path) -> Result<(), ItemError> {
        let center = city.center();
        let radius_m = self.config.radius_m;

        let graph = self.source.fetch_road_graph(center, radius_m)?;

        // Without features the map still shows the road network.
        let features = self
            .source
            .fetch_features(center, radius_m)
            .unwrap_or_else(|err| {
                event!(Level::WARN, "Failed to fetch additional data for {}: {}", city, err);
                Vec::new()
            });

        let canvas = render_map(&graph, features, center, &self.config);

        let markup = match &self.config.postprocess {
            Some(options) => {
                let mut document = SvgDocument::parse(&canvas.to_svg_string())?;
                postprocess(&mut document, &city.label(), options)
            }
            None => canvas.to_svg_string(),
        };

        write_atomically(output, markup.as_bytes())?;

        if let Err(err) = self.cleanup.clean(output) {
            event!(Level::WARN, "Failed to clean {}: {}", output.display(), err);
        }

        Ok(())
    }
}

/// Sibling path that holds an output while it is being written.
pub(crate) fn partial_path(output: &Path) -> std::path::PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);

    output.with_file_name(name)
}

// An interrupted run never leaves a file under the final name.
pub(crate) fn write_atomically(output: &Path, contents: &[u8]) -> io::Result<()> {
    let partial = partial_path(output);

    let result = fs::write(&partial, contents).and_then(|_| fs::rename(&partial, output));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }

    result
}
