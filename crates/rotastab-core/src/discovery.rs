use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Suffix of the constant-frame-rate intermediate written next to each input.
pub const CFR_SUFFIX: &str = "_cfr";
/// Suffix of the corrected, silent video.
pub const STABILIZED_SUFFIX: &str = "_stb";
/// Suffix of the final deliverable with the source audio attached.
pub const WITH_AUDIO_SUFFIX: &str = "_with_audio";

const VIDEO_EXTENSION: &str = "mp4";

/// Suffixes of files this tool writes. None of them is ever an input.
const ARTIFACT_SUFFIXES: [&str; 3] = [CFR_SUFFIX, STABILIZED_SUFFIX, WITH_AUDIO_SUFFIX];

/// One input video, identified by its file name inside the input directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VideoId {
    file_name: String,
    stem: String,
}

impl VideoId {
    /// Identify the video at `path` by its file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let stem = path.file_stem()?.to_str()?.to_string();
        Some(Self { file_name, stem })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn source_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(&self.file_name)
    }

    pub fn cfr_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(format!("{}{CFR_SUFFIX}.{VIDEO_EXTENSION}", self.stem))
    }

    pub fn stabilized_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}{STABILIZED_SUFFIX}.{VIDEO_EXTENSION}", self.stem))
    }

    pub fn with_audio_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}{WITH_AUDIO_SUFFIX}.{VIDEO_EXTENSION}", self.stem))
    }
}

/// List the `.mp4` files directly inside `input_dir`, sorted by name.
///
/// Artifacts left behind by earlier runs (`*_cfr.mp4`, `*_stb.mp4`,
/// `*_with_audio.mp4`) are not inputs, so the output directory may be the
/// input directory.
pub fn discover(input_dir: &Path) -> Result<Vec<VideoId>> {
    info!(?input_dir, "discovering input videos");

    let entries = std::fs::read_dir(input_dir)
        .with_context(|| format!("failed to read input directory {}", input_dir.display()))?;

    let mut videos = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read directory entry")?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(VIDEO_EXTENSION));
        if !is_video {
            continue;
        }
        let Some(id) = VideoId::from_path(&path) else {
            debug!(?path, "skipping non UTF-8 file name");
            continue;
        };
        if ARTIFACT_SUFFIXES.iter().any(|s| id.stem.ends_with(s)) {
            debug!(?path, "skipping artifact of a previous run");
            continue;
        }
        videos.push(id);
    }

    videos.sort();
    info!(count = videos.len(), "input videos discovered");
    Ok(videos)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn finds_mp4_files_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.mp4");
        touch(dir.path(), "a.mp4");
        touch(dir.path(), "C.MP4");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "clip.mkv");

        let found = discover(dir.path()).unwrap();
        let names: Vec<_> = found.iter().map(|v| v.file_name()).collect();
        assert_eq!(names, ["C.MP4", "a.mp4", "b.mp4"]);
    }

    #[test]
    fn skips_intermediates_and_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "run.mp4");
        touch(dir.path(), "run_cfr.mp4");
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();
        touch(&dir.path().join("nested.mp4"), "inner.mp4");

        let found = discover(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stem(), "run");
    }

    #[test]
    fn rerun_into_same_directory_finds_only_sources() {
        let dir = TempDir::new().unwrap();
        for name in ["song.mp4", "song_cfr.mp4", "song_stb.mp4", "song_with_audio.mp4"] {
            touch(dir.path(), name);
        }

        let found = discover(dir.path()).unwrap();
        let names: Vec<_> = found.iter().map(|v| v.file_name()).collect();
        assert_eq!(names, ["song.mp4"]);

        let id = &found[0];
        assert!(id.stabilized_path(dir.path()).exists());
        assert!(id.with_audio_path(dir.path()).exists());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn artifact_paths_follow_suffix_convention() {
        let id = VideoId::from_path(Path::new("videos/song.mp4")).unwrap();
        let input = Path::new("videos");
        let output = Path::new("output");
        assert_eq!(id.source_path(input), Path::new("videos/song.mp4"));
        assert_eq!(id.cfr_path(input), Path::new("videos/song_cfr.mp4"));
        assert_eq!(id.stabilized_path(output), Path::new("output/song_stb.mp4"));
        assert_eq!(
            id.with_audio_path(output),
            Path::new("output/song_with_audio.mp4")
        );
    }
}
