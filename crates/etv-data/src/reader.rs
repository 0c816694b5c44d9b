//! Input file discovery and opening.
//!
//! Every input may be stored plain or gzip-compressed; [`open_input`] tries
//! `<name>` first and then `<name>.gz`, decompressing transparently.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use etv_core::error::{EtvError, Result};
use flate2::read::GzDecoder;
use tracing::{debug, warn};

/// Suffix of gzip-compressed inputs.
pub const GZIP_SUFFIX: &str = ".gz";
/// Suffix of device log files (before any `.gz`).
pub const DEVICE_LOG_SUFFIX: &str = ".json";

// ── Public API ────────────────────────────────────────────────────────────────

/// Open `path` for buffered line reading, gunzipping when it ends in `.gz`.
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|source| EtvError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if is_gzip(path) {
        debug!("Opening {} as gzip", path.display());
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Locate `name` in `dir`, falling back to `name.gz`.
pub fn resolve_input(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Some(plain);
    }
    let gz = dir.join(format!("{}{}", name, GZIP_SUFFIX));
    gz.is_file().then_some(gz)
}

/// Open `name` (or `name.gz`) in `dir`.
pub fn open_input(dir: &Path, name: &str) -> Result<Box<dyn BufRead + Send>> {
    match resolve_input(dir, name) {
        Some(path) => open_file(&path),
        None => Err(EtvError::FileRead {
            path: dir.join(name),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no plain or .gz file"),
        }),
    }
}

/// Find device log files under `dir`, keyed by device ID (file stem).
///
/// Accepts `<id>.json` and `<id>.json.gz`; when both exist the plain file wins.
pub fn find_device_log_files(dir: &Path) -> BTreeMap<String, PathBuf> {
    if !dir.exists() {
        warn!("Log directory does not exist: {}", dir.display());
        return BTreeMap::new();
    }

    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| device_id_of(path).is_some())
        .collect();
    // Plain names sort before their `.gz` twins, so they are inserted first.
    paths.sort();

    let mut files = BTreeMap::new();
    for path in paths {
        if let Some(id) = device_id_of(&path) {
            files.entry(id).or_insert(path);
        }
    }

    debug!("Found {} device log files under {}", files.len(), dir.display());
    files
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Device ID encoded in a log file name, if the name is a device log.
fn device_id_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(GZIP_SUFFIX).unwrap_or(name);
    let id = name.strip_suffix(DEVICE_LOG_SUFFIX)?;
    (!id.is_empty()).then(|| id.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    fn write_plain(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_gz(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(content.as_bytes()).unwrap();
        enc.finish().unwrap();
        path
    }

    fn read_all(mut r: Box<dyn BufRead + Send>) -> String {
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        s
    }

    // ── open_input ────────────────────────────────────────────────────────────

    #[test]
    fn test_open_input_plain() {
        let dir = TempDir::new().unwrap();
        write_plain(dir.path(), "HDD.csv", "Date,HDD,% Estimated\n");
        let s = read_all(open_input(dir.path(), "HDD.csv").unwrap());
        assert_eq!(s, "Date,HDD,% Estimated\n");
    }

    #[test]
    fn test_open_input_falls_back_to_gz() {
        let dir = TempDir::new().unwrap();
        write_gz(dir.path(), "HDD.csv.gz", "compressed\n");
        let s = read_all(open_input(dir.path(), "HDD.csv").unwrap());
        assert_eq!(s, "compressed\n");
    }

    #[test]
    fn test_open_input_prefers_plain() {
        let dir = TempDir::new().unwrap();
        write_plain(dir.path(), "NkWh.csv", "plain\n");
        write_gz(dir.path(), "NkWh.csv.gz", "compressed\n");
        let s = read_all(open_input(dir.path(), "NkWh.csv").unwrap());
        assert_eq!(s, "plain\n");
    }

    #[test]
    fn test_open_input_missing() {
        let dir = TempDir::new().unwrap();
        let err = open_input(dir.path(), "HDD.csv").err().unwrap();
        assert!(matches!(err, EtvError::FileRead { .. }));
        assert!(resolve_input(dir.path(), "HDD.csv").is_none());
    }

    // ── find_device_log_files ─────────────────────────────────────────────────

    #[test]
    fn test_find_device_logs_plain_and_gz() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("logs");
        std::fs::create_dir_all(&sub).unwrap();
        write_plain(dir.path(), "3015.json", "");
        write_gz(&sub, "2d1a.json.gz", "");
        write_plain(dir.path(), "HDD.csv", "");
        write_plain(dir.path(), "grouping.csv", "");

        let files = find_device_log_files(dir.path());
        let ids: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["2d1a", "3015"]);
        assert!(files["2d1a"].ends_with("logs/2d1a.json.gz"));
    }

    #[test]
    fn test_find_device_logs_plain_wins_over_gz() {
        let dir = TempDir::new().unwrap();
        write_plain(dir.path(), "3015.json", "");
        write_gz(dir.path(), "3015.json.gz", "");
        let files = find_device_log_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files["3015"].ends_with("3015.json"));
    }

    #[test]
    fn test_find_device_logs_nonexistent_dir() {
        let files = find_device_log_files(Path::new("/tmp/does-not-exist-etv-test-xyz"));
        assert!(files.is_empty());
    }

    #[test]
    fn test_device_id_of() {
        assert_eq!(device_id_of(Path::new("a/3015.json")), Some("3015".to_string()));
        assert_eq!(device_id_of(Path::new("3015.json.gz")), Some("3015".to_string()));
        assert_eq!(device_id_of(Path::new(".json")), None);
        assert_eq!(device_id_of(Path::new("HDD.csv.gz")), None);
    }
}
