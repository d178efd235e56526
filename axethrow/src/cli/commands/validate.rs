//! `validate` command handler
//!
//! Loads each configuration file through the full pipeline and reports
//! the outcome per file.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::ConfigLoader;
use crate::error::{AxethrowError, ConfigError};

/// Outcome of validating one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl FileReport {
    fn render_human(&self) -> String {
        let mut out = if self.valid {
            format!("✓ {}", self.file)
        } else {
            format!("✗ {}", self.file)
        };
        for error in &self.errors {
            out.push_str(&format!("\n  error: {error}"));
        }
        for warning in &self.warnings {
            out.push_str(&format!("\n  warning: {warning}"));
        }
        out
    }
}

/// Validate configuration files.
///
/// Every file is checked before returning, so one bad file does not hide
/// problems in the others.
///
/// # Errors
///
/// Returns an I/O error if a file does not exist, or
/// `ConfigError::ValidationFailed` if any file fails (including warnings
/// when `--strict` is set).
pub fn run(args: &ValidateArgs) -> Result<(), AxethrowError> {
    for path in &args.files {
        if !path.exists() {
            return Err(AxethrowError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
    }

    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check_file(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                println!("{}", report.render_human());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    let failed = reports.iter().filter(|r| !r.valid).count();
    if failed > 0 {
        return Err(ConfigError::ValidationFailed { count: failed }.into());
    }

    Ok(())
}

fn check_file(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    tracing::info!(file = %path.display(), "validating configuration");

    let file = path.display().to_string();
    match loader.load(path) {
        Ok(result) => {
            let warnings: Vec<String> = result
                .warnings
                .iter()
                .map(|w| match w.location {
                    Some(ref location) => format!("{} at {location}", w.message),
                    None => w.message.clone(),
                })
                .collect();
            for warning in &warnings {
                tracing::warn!(file = %file, "{}", warning);
            }
            FileReport {
                valid: !(strict && !warnings.is_empty()),
                file,
                errors: Vec::new(),
                warnings,
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => FileReport {
            file,
            valid: false,
            errors: errors.iter().map(ToString::to_string).collect(),
            warnings: Vec::new(),
        },
        Err(e) => FileReport {
            file,
            valid: false,
            errors: vec![e.to_string()],
            warnings: Vec::new(),
        },
    }
}
