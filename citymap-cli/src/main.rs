use citymap_core::{
    CleanupError, CleanupTool, OutputFormat, OverpassConfig, OverpassSource, PostProcessOptions,
    ProcessConfig, RenderConfig, RenderPipeline, Selection, SelectionPolicy, Svgo, VideoConfig,
    assemble_video, process_directory, read_cities,
};

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{Level, event};

#[derive(Parser, Debug)]
#[command(version, about = "Stylized city map generator", long_about = None)]
struct Args {
    /// Log every pipeline step
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and render one map per city of the table
    Render {
        /// Delimited table with region, place, latitude and longitude columns
        #[arg(short, long, default_value = "cities.csv")]
        cities: PathBuf,

        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        #[arg(short, long, default_value_t = ';')]
        delimiter: char,

        /// Fetch radius around each city center, in meters
        #[arg(short, long, default_value_t = 5000.0)]
        radius: f64,

        #[arg(long, default_value = "https://overpass-api.de/api/interpreter")]
        overpass_url: String,

        /// Request timeout for the map data source, in seconds
        #[arg(long, default_value_t = 180)]
        timeout: u64,

        /// Post-process each map right after rendering it
        #[arg(long)]
        postprocess: bool,

        /// Skip the svgo pass over written maps
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Post-process rendered maps on a worker pool
    Process {
        #[arg(short, long, default_value = "outputs")]
        input_dir: PathBuf,

        #[arg(short, long, default_value = "outputs-processed")]
        output_dir: PathBuf,

        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        #[clap(short, long, default_value_t, value_enum)]
        select: SelectionPolicy,

        /// Number of maps picked by every policy but `all`
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Seed of the `random` policy
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[clap(short, long, default_value_t, value_enum)]
        format: OutputFormat,

        /// Delete each source map once its bitmap is written
        #[arg(long)]
        delete_source: bool,

        /// Skip the svgo pass over written maps
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Turn processed bitmaps into a video
    Video {
        #[arg(short, long, default_value = "outputs-processed")]
        input_dir: PathBuf,

        #[arg(long, default_value = "output_video")]
        frames_dir: PathBuf,

        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,

        #[arg(short, long, default_value_t = 30)]
        frame_rate: u32,
    },
}

fn cleanup_tool(disabled: bool) -> impl Fn(&Path) -> Result<(), CleanupError> + Sync {
    let svgo = Svgo::default();

    move |path: &Path| match disabled {
        true => Ok(()),
        false => svgo.clean(path),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(match args.verbose {
            true => Level::DEBUG,
            false => Level::INFO,
        })
        .with_target(false)
        .init();

    match args.command {
        Command::Render {
            cities,
            output_dir,
            delimiter,
            radius,
            overpass_url,
            timeout,
            postprocess,
            no_cleanup,
        } => {
            let delimiter = u8::try_from(delimiter)
                .map_err(|_| anyhow!("delimiter must be a single-byte character"))?;
            let cities = read_cities(&cities, delimiter)?;

            let source = OverpassSource::new(OverpassConfig {
                url: overpass_url,
                timeout: Duration::from_secs(timeout),
            })?;
            let config = RenderConfig {
                radius_m: radius,
                postprocess: postprocess.then(PostProcessOptions::default),
                ..RenderConfig::default()
            };

            let pipeline = RenderPipeline::new(source, cleanup_tool(no_cleanup), config);
            let summary = pipeline.run(&cities, &output_dir)?;

            event!(Level::DEBUG, "Render stage finished with {}", summary);
        }
        Command::Process {
            input_dir,
            output_dir,
            workers,
            select,
            count,
            seed,
            format,
            delete_source,
            no_cleanup,
        } => {
            let config = ProcessConfig {
                workers,
                selection: Selection::from_policy(select, count, seed),
                format,
                delete_source,
                ..ProcessConfig::default()
            };

            let summary =
                process_directory(&input_dir, &output_dir, &config, &cleanup_tool(no_cleanup))?;

            event!(Level::DEBUG, "Process stage finished with {}", summary);
        }
        Command::Video {
            input_dir,
            frames_dir,
            output,
            frame_rate,
        } => {
            let config = VideoConfig {
                frame_rate,
                ..VideoConfig::default()
            };

            let frames = assemble_video(&input_dir, &frames_dir, &output, &config)?;

            event!(Level::INFO, "Video created successfully from {} frames!", frames);
        }
    }

    Ok(())
}
