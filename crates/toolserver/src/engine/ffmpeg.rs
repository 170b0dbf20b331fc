//! ffmpeg discovery. yt-dlp needs it for merging and transcoding.

use std::path::{Path, PathBuf};

const COMMON_LOCATIONS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/var/lib/flatpak/exports/bin",
];

fn binary_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["ffmpeg.exe", "ffmpeg"]
    } else {
        &["ffmpeg", "ffmpeg.exe"]
    }
}

/// Finds an ffmpeg executable.
///
/// Order: explicit override, `PATH`, the current directory, then a few
/// common install locations.
pub fn locate(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "FFMPEG_PATH does not point to a file");
    }

    let path_dirs = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .unwrap_or_default();
    let cwd = std::env::current_dir().ok();

    let candidates = path_dirs
        .into_iter()
        .chain(cwd)
        .chain(COMMON_LOCATIONS.iter().map(PathBuf::from));
    find_in(candidates)
}

/// First ffmpeg binary found in `dirs`.
pub fn find_in<I>(dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    dirs.into_iter().find_map(|dir| {
        binary_names()
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Whether `path -version` runs successfully.
pub fn is_runnable(path: &Path) -> bool {
    let output = std::process::Command::new(path).arg("-version").output();

    match output {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_in_returns_first_match() {
        let empty = TempDir::new().unwrap();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(first.path().join("ffmpeg"), b"").unwrap();
        std::fs::write(second.path().join("ffmpeg"), b"").unwrap();

        let found = find_in(vec![
            empty.path().to_path_buf(),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(found, Some(first.path().join("ffmpeg")));
    }

    #[test]
    fn find_in_ignores_directories_named_ffmpeg() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("ffmpeg")).unwrap();
        assert_eq!(find_in(vec![dir.path().to_path_buf()]), None);
    }

    #[test]
    fn override_wins_when_it_exists() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("my-ffmpeg");
        std::fs::write(&bin, b"").unwrap();
        assert_eq!(locate(Some(&bin)), Some(bin));
    }
}
