use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Docx,
    Pdf,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docx => f.write_str("DOCX"),
            Self::Pdf => f.write_str("PDF"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("converter exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
}

/// Converts a single markdown file into the requested format.
#[allow(async_fn_in_trait)]
pub trait Converter {
    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        output: &Path,
    ) -> Result<(), ConvertError>;
}

/// Runs the `pandoc` executable.
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: PathBuf,
    media_dir: PathBuf,
    pdf_engine: String,
}

impl Default for Pandoc {
    fn default() -> Self {
        Self {
            program: PathBuf::from("pandoc"),
            media_dir: PathBuf::from("./media"),
            pdf_engine: "xelatex".to_string(),
        }
    }
}

impl Pandoc {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    pub fn with_pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.pdf_engine = engine.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns the first line of `pandoc --version`, failing if pandoc cannot
    /// be run.
    pub async fn version(&self) -> Result<String, ConvertError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    pub(crate) fn args(&self, input: &Path, format: TargetFormat, output: &Path) -> Vec<OsString> {
        let mut args = vec![input.as_os_str().to_owned()];

        // pandoc picks the PDF writer from the output extension; `--to` would
        // name the intermediate format there.
        match format {
            TargetFormat::Docx => {
                args.push(OsString::from("--to"));
                args.push(OsString::from("docx"));
                args.push(OsString::from("--output"));
                args.push(output.as_os_str().to_owned());
                let mut flag = OsString::from("--extract-media=");
                flag.push(&self.media_dir);
                args.push(flag);
            }
            TargetFormat::Pdf => {
                args.push(OsString::from("--output"));
                args.push(output.as_os_str().to_owned());
                args.push(OsString::from(format!("--pdf-engine={}", self.pdf_engine)));
            }
        }

        args
    }

    fn spawn_error(&self, source: io::Error) -> ConvertError {
        ConvertError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

impl Converter for Pandoc {
    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        output: &Path,
    ) -> Result<(), ConvertError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let args = self.args(input, format, output);
        debug!(program = %self.program.display(), ?args, "Running pandoc");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| self.spawn_error(source))?;

        if !result.status.success() {
            return Err(ConvertError::Failed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
