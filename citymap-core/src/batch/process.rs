use super::{BatchState, write_atomically};
use crate::{
    cleanup::CleanupTool,
    constants::WORKER_POOL_SIZE,
    document::{PostProcessOptions, SvgDocument, postprocess},
    error::{DocumentError, ItemError, PipelineError},
    types::{BatchSummary, CityIdentity},
};

#[cfg(feature = "raster")]
use crate::raster::{RasterOptions, save_png};

use std::{
    fs,
    path::{Path, PathBuf},
};

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use tracing::{Level, event, span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Re-save the processed vector map
    #[default]
    Svg,
    /// Rasterize the processed map to a bitmap
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SelectionPolicy {
    #[default]
    All,
    LargestFiles,
    LongestNames,
    Random,
}

/// Which rendered maps a post-processing run picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    LargestFiles(usize),
    LongestNames(usize),
    Random { count: usize, seed: u64 },
}

impl Selection {
    pub fn from_policy(policy: SelectionPolicy, count: usize, seed: u64) -> Self {
        match policy {
            SelectionPolicy::All => Selection::All,
            SelectionPolicy::LargestFiles => Selection::LargestFiles(count),
            SelectionPolicy::LongestNames => Selection::LongestNames(count),
            SelectionPolicy::Random => Selection::Random { count, seed },
        }
    }

    /// Picks from `files`, which must be listed in a stable order for the
    /// random policy to be reproducible.
    pub(crate) fn apply(&self, mut files: Vec<SourceFile>) -> Vec<SourceFile> {
        match *self {
            Selection::All => {}
            Selection::LargestFiles(count) => {
                files.sort_by(|a, b| b.size.cmp(&a.size));
                files.truncate(count);
            }
            Selection::LongestNames(count) => {
                files.sort_by_key(|file| std::cmp::Reverse(file.name_length()));
                files.truncate(count);
            }
            Selection::Random { count, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                files.shuffle(&mut rng);
                files.truncate(count);
            }
        }

        files
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    pub size: u64,
}

impl SourceFile {
    fn name_length(&self) -> usize {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().chars().count())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub workers: usize,
    pub selection: Selection,
    pub format: OutputFormat,
    /// Remove the source map once its bitmap is written.
    pub delete_source: bool,
    pub options: PostProcessOptions,
    #[cfg(feature = "raster")]
    pub raster: RasterOptions,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        ProcessConfig {
            workers: WORKER_POOL_SIZE,
            selection: Selection::default(),
            format: OutputFormat::default(),
            delete_source: false,
            options: PostProcessOptions::default(),
            #[cfg(feature = "raster")]
            raster: RasterOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    Skipped,
}

/// Post-processes the rendered maps of `input_dir` into `output_dir` on a
/// pool of `config.workers` threads. Completion order is not defined.
///
/// # Errors
///
/// - [PipelineError::MissingInputDirectory] when `input_dir` does not exist.
/// - [PipelineError::WorkerPool] when the worker threads cannot be started.
///
/// Failures of single files are logged and counted, never returned.
pub fn process_directory<C: CleanupTool>(
    input_dir: &Path,
    output_dir: &Path,
    config: &ProcessConfig,
    cleanup: &C,
) -> Result<BatchSummary, PipelineError> {
    let span = span!(Level::DEBUG, "process_directory");
    let _guard = span.enter();

    if !input_dir.is_dir() {
        return Err(PipelineError::MissingInputDirectory(input_dir.to_path_buf()));
    }

    let selected = config.selection.apply(list_vector_files(input_dir)?);

    event!(
        Level::INFO,
        "Processing {} SVG files in {}",
        selected.len(),
        input_dir.display()
    );

    fs::create_dir_all(output_dir).map_err(|err| PipelineError::io(output_dir, err))?;
    let state = BatchState::scan(output_dir, config.format.extension())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()?;

    let outcomes = pool.install(|| {
        selected
            .par_iter()
            .map(|file| match process_file(&file.path, output_dir, &state, config, cleanup) {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    event!(Level::ERROR, "Failed to process {}: {}", file.path.display(), err);
                    None
                }
            })
            .collect::<Vec<_>>()
    });

    let mut summary = BatchSummary::default();
    for outcome in outcomes {
        match outcome {
            Some(ProcessOutcome::Processed) => summary.processed += 1,
            Some(ProcessOutcome::Skipped) => summary.skipped += 1,
            None => summary.failed += 1,
        }
    }

    event!(Level::INFO, "Processed {} files: {}", summary.total(), summary);
    event!(Level::INFO, "Done");

    Ok(summary)
}

/// Post-processes one rendered map, titled after its `name_region` file name.
pub fn process_file<C: CleanupTool>(
    source: &Path,
    output_dir: &Path,
    state: &BatchState,
    config: &ProcessConfig,
    cleanup: &C,
) -> Result<ProcessOutcome, ItemError> {
    let identity = CityIdentity::from_path(source)?;

    let file_name = source
        .file_name()
        .ok_or_else(|| DocumentError::MalformedName(source.display().to_string()))?;
    let output = output_dir
        .join(file_name)
        .with_extension(config.format.extension());

    if state.contains(&output) {
        event!(Level::INFO, "Already processed: {}", output.display());
        return Ok(ProcessOutcome::Skipped);
    }

    event!(Level::INFO, "Processing {}", identity);

    let mut document = SvgDocument::parse(&fs::read_to_string(source)?)?;
    let markup = postprocess(&mut document, &identity.label(), &config.options);

    match config.format {
        OutputFormat::Svg => {
            write_atomically(&output, markup.as_bytes())?;

            if let Err(err) = cleanup.clean(&output) {
                event!(Level::WARN, "Failed to clean {}: {}", output.display(), err);
            }
        }
        OutputFormat::Png => {
            write_bitmap(&markup, &output, config)?;

            if config.delete_source {
                fs::remove_file(source)?;
            }
        }
    }

    event!(Level::INFO, "Processed {}", identity);

    Ok(ProcessOutcome::Processed)
}

#[cfg(feature = "raster")]
fn write_bitmap(markup: &str, output: &Path, config: &ProcessConfig) -> Result<(), ItemError> {
    let partial = super::partial_path(output);

    if let Err(err) = save_png(markup, &partial, &config.raster) {
        let _ = fs::remove_file(&partial);
        return Err(err.into());
    }

    fs::rename(&partial, output)?;

    Ok(())
}

#[cfg(not(feature = "raster"))]
fn write_bitmap(_markup: &str, _output: &Path, _config: &ProcessConfig) -> Result<(), ItemError> {
    Err(ItemError::RasterUnavailable)
}

// Sorted by path so every selection starts from the same order.
fn list_vector_files(dir: &Path) -> Result<Vec<SourceFile>, PipelineError> {
    let mut files = fs::read_dir(dir)
        .map_err(|err| PipelineError::io(dir, err))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let metadata = entry.metadata().ok()?;

            (metadata.is_file() && path.extension().is_some_and(|ext| ext == "svg")).then(|| {
                SourceFile {
                    path,
                    size: metadata.len(),
                }
            })
        })
        .collect::<Vec<_>>();

    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{NoCleanup, error::CleanupError};

    use std::sync::atomic::{AtomicUsize, Ordering};

    const RENDERED: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100">
 <g id="roads"><path d="M 0 0 L 100 100" fill="none" stroke="#000000"/></g>
 <g id="layer-water"><path d="M 10 10 L 20 10 L 20 20 Z" fill="#0000ff"/></g>
</svg>"##;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("citymap-process-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("outputs")).unwrap();
        dir
    }

    fn source_files(names_and_sizes: &[(&str, u64)]) -> Vec<SourceFile> {
        names_and_sizes
            .iter()
            .map(|(name, size)| SourceFile {
                path: PathBuf::from(format!("outputs/{name}.svg")),
                size: *size,
            })
            .collect()
    }

    fn names(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|file| file.path.file_stem().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_largest_files_selection() {
        let files = source_files(&[("A_SP", 10), ("B_RJ", 30), ("C_MG", 20)]);

        let selected = Selection::LargestFiles(2).apply(files);

        assert_eq!(names(&selected), vec!["B_RJ", "C_MG"]);
    }

    #[test]
    fn test_longest_names_selection() {
        let files = source_files(&[("Ilha_SP", 1), ("Sao_Jose_dos_Campos_SP", 1), ("Rio_de_Janeiro_RJ", 1)]);

        let selected = Selection::LongestNames(2).apply(files);

        assert_eq!(names(&selected), vec!["Sao_Jose_dos_Campos_SP", "Rio_de_Janeiro_RJ"]);
    }

    #[test]
    fn test_random_selection_is_reproducible() {
        let files = source_files(&[
            ("A_SP", 1),
            ("B_SP", 1),
            ("C_SP", 1),
            ("D_SP", 1),
            ("E_SP", 1),
            ("F_SP", 1),
        ]);

        let first = Selection::Random { count: 3, seed: 42 }.apply(files.clone());
        let second = Selection::Random { count: 3, seed: 42 }.apply(files.clone());

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert!(first.iter().all(|file| files.contains(file)));
    }

    #[test]
    fn test_selection_larger_than_input_keeps_everything() {
        let files = source_files(&[("A_SP", 1), ("B_SP", 2)]);

        assert_eq!(Selection::LargestFiles(10).apply(files.clone()).len(), 2);
        assert_eq!(Selection::All.apply(files.clone()), files);
    }

    #[test]
    fn test_missing_input_directory_is_fatal() {
        let dir = scratch_dir("missing");

        let result = process_directory(
            &dir.join("does-not-exist"),
            &dir.join("processed"),
            &ProcessConfig::default(),
            &NoCleanup,
        );

        assert!(matches!(result, Err(PipelineError::MissingInputDirectory(_))));
        assert!(!dir.join("processed").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_process_directory_isolates_failures_and_resumes() {
        let dir = scratch_dir("svg");
        let input = dir.join("outputs");
        let output = dir.join("processed");

        fs::write(input.join("Example_City_SP.svg"), RENDERED).unwrap();
        fs::write(input.join("Rio_de_Janeiro_RJ.svg"), RENDERED).unwrap();
        fs::write(input.join("NoRegion.svg"), RENDERED).unwrap();
        fs::write(input.join("Broken_MG.svg"), "<html></html>").unwrap();

        let cleaned = AtomicUsize::new(0);
        let cleanup = |_: &Path| -> Result<(), CleanupError> {
            cleaned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };

        let first = process_directory(&input, &output, &ProcessConfig::default(), &cleanup).unwrap();

        assert_eq!(first, BatchSummary { processed: 2, skipped: 0, failed: 2 });
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);

        let markup = fs::read_to_string(output.join("Rio_de_Janeiro_RJ.svg")).unwrap();
        assert!(markup.contains(">Rio de Janeiro, RJ</text>"));
        assert!(!markup.contains("width=\"100\""));

        let second = process_directory(&input, &output, &ProcessConfig::default(), &cleanup).unwrap();

        assert_eq!(second, BatchSummary { processed: 0, skipped: 2, failed: 2 });
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_selection_limits_processed_files() {
        let dir = scratch_dir("select");
        let input = dir.join("outputs");
        let output = dir.join("processed");

        fs::write(input.join("Small_SP.svg"), RENDERED).unwrap();
        fs::write(
            input.join("Large_RJ.svg"),
            RENDERED.replace("</svg>", "<!-- padding padding padding --></svg>"),
        )
        .unwrap();

        let config = ProcessConfig {
            workers: 2,
            selection: Selection::LargestFiles(1),
            ..ProcessConfig::default()
        };
        let summary = process_directory(&input, &output, &config, &NoCleanup).unwrap();

        assert_eq!(summary.processed, 1);
        assert!(output.join("Large_RJ.svg").exists());
        assert!(!output.join("Small_SP.svg").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "raster")]
    #[test]
    fn test_png_output_replaces_source() {
        let dir = scratch_dir("png");
        let input = dir.join("outputs");
        let output = dir.join("processed");

        fs::write(input.join("Example_City_SP.svg"), RENDERED).unwrap();

        let config = ProcessConfig {
            format: OutputFormat::Png,
            delete_source: true,
            raster: RasterOptions {
                size: 64,
                load_system_fonts: false,
                ..RasterOptions::default()
            },
            ..ProcessConfig::default()
        };
        let summary = process_directory(&input, &output, &config, &NoCleanup).unwrap();

        assert_eq!(summary.processed, 1);
        assert!(output.join("Example_City_SP.png").exists());
        assert!(!output.join("Example_City_SP.png.partial").exists());
        assert!(!input.join("Example_City_SP.svg").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
