use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure to obtain map data for a single city.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("no road network found within {radius_m}m of ({lat}, {lon})")]
    EmptyGraph { lat: f64, lon: f64, radius_m: f64 },
    #[error("unexpected response from map data source: {0}")]
    Decode(String),
}

/// A vector document or its file name does not have the expected structure.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document has no root <svg> element")]
    MissingRoot,
    #[error("unbalanced closing tag </{0}>")]
    Unbalanced(String),
    #[error(r#"file name "{0}" does not match the name_region pattern"#)]
    MalformedName(String),
}

/// The external cleanup tool could not clean a file.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("{0} is not installed")]
    ToolUnavailable(String),
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(feature = "raster")]
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("cannot parse document for rasterization: {0}")]
    Parse(#[from] usvg::Error),
    #[error("cannot allocate a {width}x{height} bitmap")]
    Pixmap { width: u32, height: u32 },
    #[error("cannot encode bitmap: {0}")]
    Encode(String),
}

/// Failure of a single batch item. Never escapes the per-item boundary.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[cfg(feature = "raster")]
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("rasterization support is not compiled in")]
    RasterUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Fatal preconditions that abort a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input directory {0} does not exist")]
    MissingInputDirectory(PathBuf),
    #[error("input file {0} does not exist")]
    MissingInputFile(PathBuf),
    #[error("cannot read city table: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("no frames found in {0}")]
    NoFrames(PathBuf),
    #[error(transparent)]
    Tool(#[from] CleanupError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
