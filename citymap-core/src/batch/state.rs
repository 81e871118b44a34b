use crate::error::PipelineError;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

/// Outputs already present in a directory. An output listed here is never
/// produced again.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    produced: HashSet<PathBuf>,
}

impl BatchState {
    /// Lists `dir` once, keeping files with the given extension. A missing
    /// directory yields an empty state.
    pub fn scan(dir: &Path, extension: &str) -> Result<Self, PipelineError> {
        if !dir.is_dir() {
            return Ok(Self::default());
        }

        let produced = fs::read_dir(dir)
            .map_err(|err| PipelineError::io(dir, err))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == extension))
            .collect();

        Ok(BatchState { produced })
    }

    pub fn contains(&self, output: &Path) -> bool {
        self.produced.contains(output)
    }

    pub fn record(&mut self, output: PathBuf) {
        self.produced.insert(output);
    }

    pub fn len(&self) -> usize {
        self.produced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.produced.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scan_filters_by_extension() {
        let dir = std::env::temp_dir().join(format!("citymap-state-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        fs::write(dir.join("Example_City_SP.svg"), "<svg/>").unwrap();
        fs::write(dir.join("Other_RJ.svg.partial"), "<svg").unwrap();
        fs::write(dir.join("Other_RJ.png"), "").unwrap();

        let mut state = BatchState::scan(&dir, "svg").unwrap();

        assert_eq!(state.len(), 1);
        assert!(state.contains(&dir.join("Example_City_SP.svg")));
        assert!(!state.contains(&dir.join("Other_RJ.svg")));

        state.record(dir.join("Other_RJ.svg"));
        assert!(state.contains(&dir.join("Other_RJ.svg")));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let state = BatchState::scan(Path::new("/nonexistent/citymap/outputs"), "svg").unwrap();

        assert!(state.is_empty());
    }
}
