//! Input expansion and batch reporting.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use zenimage::ImageFormat;

/// Expand input patterns into a deduplicated list of image files.
///
/// Handles:
/// - Glob patterns (containing `*`, `?`, `[`)
/// - Plain file paths, whatever their extension
/// - Directories (recursive, by known image extension)
///
/// Results are sorted by file size descending for parallel load balancing.
pub fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            for entry in glob::glob(pattern)? {
                let path = entry?;
                if path.is_file() && is_image(&path) {
                    push_unique(path, &mut seen, &mut files);
                }
            }
        } else {
            let path = PathBuf::from(pattern);
            if path.is_dir() {
                for_each_image_in_dir(&path, &mut seen, &mut files);
            } else if path.is_file() {
                push_unique(path, &mut seen, &mut files);
            } else {
                anyhow::bail!("not a file or directory: {}", path.display());
            }
        }
    }

    files.sort_by_cached_key(|p| std::cmp::Reverse(p.metadata().map(|m| m.len()).unwrap_or(0)));
    Ok(files)
}

fn push_unique(path: PathBuf, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    if let Ok(canonical) = path.canonicalize() {
        if seen.insert(canonical) {
            files.push(path);
        }
    }
}

/// Check if a file path has a recognized image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .is_some()
}

fn for_each_image_in_dir(dir: &Path, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot read directory");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            for_each_image_in_dir(&path, seen, files);
        } else if path.is_file() && is_image(&path) {
            push_unique(path, seen, files);
        }
    }
}

/// Result of converting a single file.
#[derive(Debug)]
pub struct FileResult {
    pub input_path: PathBuf,
    pub input_size: u64,
    pub output_size: Option<u64>,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Accumulated batch summary.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<FileResult>,
}

impl BatchSummary {
    pub fn total_input_size(&self) -> u64 {
        self.results.iter().map(|r| r.input_size).sum()
    }

    pub fn total_output_size(&self) -> u64 {
        self.results.iter().filter_map(|r| r.output_size).sum()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_none()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    /// Print a human-readable summary table.
    pub fn print_report(&self) {
        if self.results.is_empty() {
            println!("No files converted.");
            return;
        }

        println!(
            "{:<40} {:>10} {:>10} {:>8} {:>8}",
            "File", "Input", "Output", "Change", "Time"
        );
        println!("{}", "-".repeat(80));

        for r in &self.results {
            let name = r
                .input_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?");
            let name = match name.char_indices().rev().nth(35) {
                Some((i, _)) if name.len() > 38 => format!("..{}", &name[i..]),
                _ => name.to_string(),
            };

            match (&r.error, r.output_size) {
                (Some(err), _) => {
                    println!("{:<40} {:>10} {}", name, format_size(r.input_size), err);
                }
                (None, Some(out_size)) => {
                    let time_ms = r.duration.as_millis();
                    let time_str = if time_ms >= 1000 {
                        format!("{:.1}s", time_ms as f64 / 1000.0)
                    } else {
                        format!("{time_ms}ms")
                    };
                    println!(
                        "{:<40} {:>10} {:>10} {:>8} {:>8}",
                        name,
                        format_size(r.input_size),
                        format_size(out_size),
                        percent_change(r.input_size, out_size),
                        time_str,
                    );
                }
                (None, None) => {}
            }
        }

        println!("{}", "-".repeat(80));
        let total_in = self.total_input_size();
        let total_out = self.total_output_size();
        println!(
            "{} converted, {} errors | {} -> {} ({})",
            self.success_count(),
            self.error_count(),
            format_size(total_in),
            format_size(total_out),
            percent_change(total_in, total_out),
        );
    }
}

/// Signed size change, or `N/A` for empty inputs.
pub fn percent_change(input: u64, output: u64) -> String {
    if input > 0 {
        let pct = (output as f64 - input as f64) / input as f64 * 100.0;
        format!("{pct:+.1}%")
    } else {
        "N/A".to_string()
    }
}

/// Format a byte size into a human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
