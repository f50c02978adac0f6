//! Output path resolution with format-aware extension changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use zenimage::ImageFormat;

/// Resolved output configuration.
pub struct OutputConfig {
    pub target_dir: Option<PathBuf>,
    pub target_file: Option<PathBuf>,
    pub force: bool,
    /// Target format; `None` keeps each input's format and extension.
    pub target_format: Option<ImageFormat>,
}

impl OutputConfig {
    pub fn new(output: Option<&str>, force: bool, target_format: Option<ImageFormat>) -> Self {
        let (target_dir, target_file) = match output {
            Some(o) => {
                let path = PathBuf::from(o);
                if o.ends_with('/') || o.ends_with('\\') || path.is_dir() {
                    (Some(path), None)
                } else {
                    (None, Some(path))
                }
            }
            None => (None, None),
        };

        Self {
            target_dir,
            target_file,
            force,
            target_format,
        }
    }

    /// Resolve the output path for a given input file.
    pub fn resolve(&self, input: &Path, input_count: usize) -> anyhow::Result<PathBuf> {
        if let Some(ref target) = self.target_file {
            if input_count > 1 {
                bail!("-o with a file path only works for a single input file (got {input_count})");
            }
            return Ok(target.clone());
        }

        let filename = self.output_filename(input);
        match self.target_dir {
            Some(ref dir) => Ok(dir.join(filename)),
            None => Ok(input.parent().unwrap_or(Path::new(".")).join(filename)),
        }
    }

    fn output_filename(&self, input: &Path) -> String {
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        format!("{stem}.{}", self.output_extension(input))
    }

    fn output_extension(&self, input: &Path) -> String {
        match self.target_format {
            Some(fmt) => fmt.extensions().first().unwrap_or(&"bin").to_string(),
            None => input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin")
                .to_string(),
        }
    }

    /// Refuse to clobber the input, or an existing output without --force.
    pub fn check_writable(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        if let (Ok(ci), Ok(co)) = (input.canonicalize(), output.canonicalize()) {
            if ci == co {
                bail!("output would overwrite input: {}", input.display());
            }
        }

        if output.exists() && !self.force {
            bail!(
                "output already exists: {}\nUse --force to overwrite",
                output.display()
            );
        }

        Ok(())
    }

    /// Create parent directories for the output path.
    pub fn ensure_parent(output: &Path) -> anyhow::Result<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory: {}", parent.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_target_format() {
        let config = OutputConfig::new(Some("out/"), false, Some(ImageFormat::Tga));
        let path = config.resolve(Path::new("in/photo.png"), 3).unwrap();
        assert_eq!(path, Path::new("out/photo.tga"));
    }

    #[test]
    fn same_format_keeps_extension_next_to_input() {
        let config = OutputConfig::new(None, false, None);
        let path = config.resolve(Path::new("in/scan.PGM"), 1).unwrap();
        assert_eq!(path, Path::new("in/scan.PGM"));
    }

    #[test]
    fn single_file_target_rejects_batches() {
        let config = OutputConfig::new(Some("x.bmp"), false, Some(ImageFormat::Bmp));
        assert!(config.resolve(Path::new("a.png"), 1).is_ok());
        assert!(config.resolve(Path::new("a.png"), 2).is_err());
    }
}
