use crate::{
    cleanup::run_program,
    constants::{VIDEO_ENCODER, VIDEO_FRAME_RATE},
    error::PipelineError,
};

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use tracing::{Level, event};

const FRAME_PATTERN: &str = "frame_%04d.png";

#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    pub encoder: String,
    pub frame_rate: u32,
    pub crf: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            encoder: VIDEO_ENCODER.to_string(),
            frame_rate: VIDEO_FRAME_RATE,
            crf: 25,
        }
    }
}

/// Moves every bitmap into `frames_dir` as a numbered sequence, in name order.
pub fn collect_frames(input_dir: &Path, frames_dir: &Path) -> Result<usize, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::MissingInputDirectory(input_dir.to_path_buf()));
    }

    let mut frames = fs::read_dir(input_dir)
        .map_err(|err| PipelineError::io(input_dir, err))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "png"))
        .collect::<Vec<PathBuf>>();

    if frames.is_empty() {
        return Err(PipelineError::NoFrames(input_dir.to_path_buf()));
    }

    frames.sort();

    fs::create_dir_all(frames_dir).map_err(|err| PipelineError::io(frames_dir, err))?;

    for (index, frame) in frames.iter().enumerate() {
        let target = frames_dir.join(format!("frame_{index:04}.png"));

        fs::rename(frame, &target).map_err(|err| PipelineError::io(frame, err))?;
    }

    event!(Level::INFO, "Collected {} frames into {}", frames.len(), frames_dir.display());

    Ok(frames.len())
}

pub fn encode_video(frames_dir: &Path, output: &Path, config: &VideoConfig) -> Result<(), PipelineError> {
    let pattern = frames_dir.join(FRAME_PATTERN);
    let frame_rate = config.frame_rate.to_string();
    let crf = config.crf.to_string();

    let args = [
        OsStr::new("-y"),
        OsStr::new("-r"),
        OsStr::new(&frame_rate),
        OsStr::new("-i"),
        pattern.as_os_str(),
        OsStr::new("-vcodec"),
        OsStr::new("libx264"),
        OsStr::new("-crf"),
        OsStr::new(&crf),
        OsStr::new("-pix_fmt"),
        OsStr::new("yuv420p"),
        output.as_os_str(),
    ];

    run_program(&config.encoder, args)?;

    event!(Level::INFO, "Video created: {}", output.display());

    Ok(())
}

pub fn assemble_video(
    input_dir: &Path,
    frames_dir: &Path,
    output: &Path,
    config: &VideoConfig,
) -> Result<usize, PipelineError> {
    let frames = collect_frames(input_dir, frames_dir)?;
    encode_video(frames_dir, output, config)?;

    Ok(frames)
}
