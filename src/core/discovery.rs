// LogSieve - core/discovery.rs
//
// Top-level directory listing of candidate log files.
//
// Architecture note: this module uses `walkdir` for directory traversal as an
// OS abstraction. It reads only file *metadata* (type, creation time), never
// file *contents* -- that boundary is owned by the pipeline (app::pipeline)
// and the field extractor (core::extract).
//
// Behaviour:
//   - Only entries directly inside the root are considered (no recursion).
//   - Extension matching is case-insensitive on the extension token only.
//   - A listing is all-or-nothing: any traversal or metadata error fails the
//     whole call rather than returning a partial list.
//   - Results are sorted by file name so downstream processing is
//     deterministic regardless of platform enumeration order.

use crate::core::model::{LogFileRef, TimeWindow};
use crate::util::error::DiscoveryError;
use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::path::Path;

/// List files directly under `root` whose extension is in `extensions` and,
/// when `window` is given, whose creation timestamp lies inside it.
///
/// `extensions` may be written with or without a leading dot and in any case.
pub fn list_files(
    root: &Path,
    extensions: &[String],
    window: Option<&TimeWindow>,
) -> Result<Vec<LogFileRef>, DiscoveryError> {
    // --- Pre-flight validation ---
    // fs::metadata rather than Path::is_dir so permission errors are not
    // reported as "does not exist".
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DiscoveryError::PathNotFound {
                path: root.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(DiscoveryError::Metadata {
                path: root.to_path_buf(),
                source,
            });
        }
    }

    let wanted = normalize_extensions(extensions);

    tracing::debug!(
        root = %root.display(),
        extensions = ?wanted,
        windowed = window.is_some(),
        "Listing starting"
    );

    let mut files: Vec<LogFileRef> = Vec::new();

    let walker = walkdir::WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false);

    for entry_result in walker {
        let entry = entry_result.map_err(|source| DiscoveryError::Traversal {
            path: root.to_path_buf(),
            source,
        })?;

        let path = entry.path();

        // Follow symlinks for the type check so linked log files are listed.
        let metadata = std::fs::metadata(path).map_err(|source| DiscoveryError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            continue;
        }

        if !has_extension(path, &wanted) {
            tracing::trace!(file = %path.display(), "Extension not compatible");
            continue;
        }

        let created = creation_time(&metadata).map_err(|source| DiscoveryError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

        files.push(LogFileRef::new(path, created));
    }

    if let Some(w) = window {
        let listed = files.len();
        retain_within_window(&mut files, w);
        tracing::debug!(
            listed,
            kept = files.len(),
            "Time window applied"
        );
    }

    sort_by_name(&mut files);

    tracing::debug!(files = files.len(), "Listing complete");

    Ok(files)
}

/// Keep only the files whose creation timestamp lies in `window`.
pub fn retain_within_window(files: &mut Vec<LogFileRef>, window: &TimeWindow) {
    files.retain(|f| window.contains(&f.created));
}

/// Sort files by name ascending (byte order of the file name).
pub fn sort_by_name(files: &mut [LogFileRef]) {
    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
}

/// Split a comma-separated extension list (`".log, .TXT"`) into normalised
/// tokens. Empty items are dropped.
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    normalize_extensions(
        &raw.split(',')
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
    )
}

/// Lower-case, trim and strip the leading dot from each extension.
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    let mut out: Vec<String> = extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Returns true if the extension token of `path` is in `normalized`.
/// Files without an extension never match.
fn has_extension(path: &Path, normalized: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_lowercase();
            normalized.iter().any(|w| *w == ext)
        }
        None => false,
    }
}

/// Creation timestamp, falling back to the modification time on
/// filesystems that do not record birth time.
pub fn creation_time(metadata: &Metadata) -> std::io::Result<DateTime<Local>> {
    let system_time = match metadata.created() {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => metadata.modified()?,
        Err(e) => return Err(e),
    };
    Ok(DateTime::<Local>::from(system_time))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn make_temp_dir() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        fs::write(root.join("b_station.log"), "START;x\n").expect("write b");
        fs::write(root.join("a_station.LOG"), "START;y\n").expect("write a");
        fs::write(root.join("notes.txt"), "text\n").expect("write txt");
        fs::write(root.join("archive.log.gz"), "binary").expect("write gz");
        fs::write(root.join("README"), "no extension").expect("write readme");

        let sub = root.join("nested");
        fs::create_dir(&sub).expect("mkdir nested");
        fs::write(sub.join("deep.log"), "should not be listed\n").expect("write deep");

        dir
    }

    fn names(files: &[LogFileRef]) -> Vec<String> {
        files.iter().map(|f| f.file_name()).collect()
    }

    #[test]
    fn test_lists_top_level_matching_files_sorted() {
        let dir = make_temp_dir();
        let files = list_files(dir.path(), &exts(&[".log"]), None).unwrap();
        assert_eq!(names(&files), vec!["a_station.LOG", "b_station.log"]);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = make_temp_dir();
        let files = list_files(dir.path(), &exts(&["LOG", ".Txt"]), None).unwrap();
        assert_eq!(
            names(&files),
            vec!["a_station.LOG", "b_station.log", "notes.txt"]
        );
    }

    #[test]
    fn test_extension_token_only() {
        // "archive.log.gz" has extension "gz", not "log".
        let dir = make_temp_dir();
        let files = list_files(dir.path(), &exts(&["log"]), None).unwrap();
        assert!(!names(&files).contains(&"archive.log.gz".to_string()));
    }

    #[test]
    fn test_does_not_recurse() {
        let dir = make_temp_dir();
        let files = list_files(dir.path(), &exts(&["log"]), None).unwrap();
        assert!(!names(&files).contains(&"deep.log".to_string()));
    }

    #[test]
    fn test_path_not_found() {
        let result = list_files(
            Path::new("/nonexistent/path/logsieve"),
            &exts(&["log"]),
            None,
        );
        assert!(matches!(result, Err(DiscoveryError::PathNotFound { .. })));
    }

    #[test]
    fn test_root_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.log");
        fs::write(&file, "content").unwrap();
        let result = list_files(&file, &exts(&["log"]), None);
        assert!(matches!(result, Err(DiscoveryError::NotADirectory { .. })));
    }

    #[test]
    fn test_window_excludes_files_outside() {
        let dir = make_temp_dir();
        let past = Local.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::bounded(past, past);
        let files = list_files(dir.path(), &exts(&["log"]), Some(&window)).unwrap();
        assert!(files.is_empty(), "freshly created files are not in 2000");

        let wide = TimeWindow::bounded(past, Local::now() + chrono::Duration::days(1));
        let files = list_files(dir.path(), &exts(&["log"]), Some(&wide)).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_window_bounds_are_inclusive_on_listing() {
        let dir = make_temp_dir();
        let all = list_files(dir.path(), &exts(&["log"]), None).unwrap();
        let target = &all[1];

        let exact = TimeWindow::bounded(target.created, target.created);
        let files = list_files(dir.path(), &exts(&["log"]), Some(&exact)).unwrap();
        assert!(names(&files).contains(&target.file_name()));
        assert!(files.iter().all(|f| f.created == target.created));

        let before = TimeWindow::bounded(
            target.created - chrono::Duration::days(2),
            target.created - chrono::Duration::days(1),
        );
        let files = list_files(dir.path(), &exts(&["log"]), Some(&before)).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_retain_within_window_selects_inclusive_range() {
        let day = |d: u32| Local.with_ymd_and_hms(2024, 1, d, 10, 0, 0).unwrap();
        let mut files = vec![
            LogFileRef::new("jan1.log", day(1)),
            LogFileRef::new("jan2.log", day(2)),
            LogFileRef::new("jan4.log", day(4)),
        ];
        let start = Local.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Local.with_ymd_and_hms(2024, 1, 3, 23, 59, 59).unwrap();
        retain_within_window(&mut files, &TimeWindow::bounded(start, end));
        assert_eq!(names(&files), vec!["jan2.log"]);
    }

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(
            parse_extension_list(" .LOG, txt,, .csv "),
            vec!["csv", "log", "txt"]
        );
        assert!(parse_extension_list("").is_empty());
    }
}
