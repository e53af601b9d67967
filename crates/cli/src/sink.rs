//! Where the generated document goes.

use std::io::Write;
use std::path::{Path, PathBuf};

const FALLBACK_STEM: &str = "fleetform";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    File(PathBuf),
}

impl Sink {
    /// `--out` wins; `--write` picks `<program>.json` in the working directory.
    pub fn from_flags(out: Option<PathBuf>, write: bool) -> Sink {
        match (out, write) {
            (Some(path), _) => Sink::File(path),
            (None, true) => Sink::File(PathBuf::from(default_file_name())),
            (None, false) => Sink::Stdout,
        }
    }

    /// Writes the whole document at once. A failed write leaves nothing to
    /// recover; rerunning the generator replaces the file.
    pub fn write(&self, text: &str) -> std::io::Result<()> {
        match self {
            Sink::Stdout => write_flushed(std::io::stdout().lock(), text),
            Sink::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, text)?;
                tracing::info!(path = %path.display(), bytes = text.len(), "wrote template");
                Ok(())
            }
        }
    }
}

/// A closed pipe surfaces as an `io::Error` instead of a panic.
fn write_flushed(mut out: impl Write, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

/// The running program's name with a `.json` suffix.
pub fn default_file_name() -> String {
    let stem = std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_owned());
    format!("{}.json", stem)
}
