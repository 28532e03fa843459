use anyhow::{anyhow, Result};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

use crate::converter::{Converter, TargetFormat};
use crate::merger::{collect_markdown_files, merge_markdown_files, DEFAULT_TITLE};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub docs_dir: PathBuf,
    pub word_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub merged_file: PathBuf,
    pub title: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            word_dir: PathBuf::from("exports/word"),
            pdf_dir: PathBuf::from("exports/pdf"),
            merged_file: PathBuf::from("exports/dfs_documentation.md"),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ExportOptions {
    /// File stem shared by the merged markdown, DOCX and PDF outputs.
    pub fn merged_stem(&self) -> String {
        self.merged_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merged".to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedConversion {
    pub source: PathBuf,
    pub format: TargetFormat,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub merged_docx: Option<PathBuf>,
    pub merged_pdf: Option<PathBuf>,
    pub docx_converted: usize,
    pub pdf_converted: usize,
    pub failures: Vec<FailedConversion>,
}

/// Removes `directory` if present and recreates it empty.
pub async fn clean_directory(directory: &Path) -> Result<()> {
    let exists = fs::try_exists(directory)
        .await
        .map_err(|e| anyhow!("Failed to inspect {}: {}", directory.display(), e))?;
    if exists {
        fs::remove_dir_all(directory)
            .await
            .map_err(|e| anyhow!("Failed to remove {}: {}", directory.display(), e))?;
        debug!(dir = %directory.display(), "Removed output directory");
    }

    fs::create_dir_all(directory)
        .await
        .map_err(|e| anyhow!("Failed to create {}: {}", directory.display(), e))?;

    Ok(())
}

/// Resolves `path` against the filesystem even when it does not exist yet:
/// the deepest existing ancestor is canonicalized and the rest appended.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(rest.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute.clone()),
        }
    }
}

/// Fails when recreating `out_dir` would delete `docs_dir`.
fn ensure_outside_docs(docs_dir: &Path, out_dir: &Path) -> Result<()> {
    let docs = resolve_path(docs_dir)?;
    let out = resolve_path(out_dir)?;
    if docs.starts_with(&out) {
        return Err(anyhow!(
            "Output directory '{}' contains the docs directory '{}'",
            out_dir.display(),
            docs_dir.display()
        ));
    }
    Ok(())
}

/// Mirrors `file`'s location under `docs_dir` into `out_dir`, swapping the
/// extension for the target format.
pub fn output_path(docs_dir: &Path, file: &Path, out_dir: &Path, format: TargetFormat) -> PathBuf {
    let relative = file.strip_prefix(docs_dir).unwrap_or(file);
    out_dir.join(relative).with_extension(format.extension())
}

pub struct Exporter<C> {
    options: ExportOptions,
    converter: C,
}

impl<C: Converter> Exporter<C> {
    pub fn new(options: ExportOptions, converter: C) -> Self {
        Self { options, converter }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub async fn run(&self) -> Result<ExportSummary> {
        let opts = &self.options;

        if !opts.docs_dir.is_dir() {
            return Err(anyhow!("Docs directory '{}' does not exist", opts.docs_dir.display()));
        }

        ensure_outside_docs(&opts.docs_dir, &opts.word_dir)?;
        ensure_outside_docs(&opts.docs_dir, &opts.pdf_dir)?;

        clean_directory(&opts.word_dir).await?;
        clean_directory(&opts.pdf_dir).await?;

        let mut summary = ExportSummary::default();

        info!("Step 1: Creating merged markdown file...");
        let merged = merge_markdown_files(&opts.docs_dir, &opts.merged_file, &opts.title).await?;

        let stem = opts.merged_stem();

        info!("Step 2: Converting merged file to DOCX...");
        let docx_output = opts.word_dir.join(format!("{}.docx", stem));
        if self.convert(&merged, TargetFormat::Docx, &docx_output, &mut summary).await {
            info!("Successfully created: {}", docx_output.display().to_string().green());
            summary.merged_docx = Some(docx_output);
        }

        info!("Step 3: Converting merged file to PDF...");
        let pdf_output = opts.pdf_dir.join(format!("{}.pdf", stem));
        if self.convert(&merged, TargetFormat::Pdf, &pdf_output, &mut summary).await {
            info!("Successfully created: {}", pdf_output.display().to_string().green());
            summary.merged_pdf = Some(pdf_output);
        }

        info!("Step 4: Converting individual files...");
        let files = collect_markdown_files(&opts.docs_dir)?;

        for md_file in &files {
            let word_path = output_path(&opts.docs_dir, md_file, &opts.word_dir, TargetFormat::Docx);
            if self.convert(md_file, TargetFormat::Docx, &word_path, &mut summary).await {
                summary.docx_converted += 1;
            }

            let pdf_path = output_path(&opts.docs_dir, md_file, &opts.pdf_dir, TargetFormat::Pdf);
            if self.convert(md_file, TargetFormat::Pdf, &pdf_path, &mut summary).await {
                summary.pdf_converted += 1;
            }
        }

        info!(
            docx = summary.docx_converted,
            pdf = summary.pdf_converted,
            failures = summary.failures.len(),
            "Conversion complete"
        );

        Ok(summary)
    }

    async fn convert(
        &self,
        input: &Path,
        format: TargetFormat,
        output: &Path,
        summary: &mut ExportSummary,
    ) -> bool {
        debug!("Converting \"{}\" into \"{}\"", input.display(), output.display().to_string().blue());

        match self.converter.convert(input, format, output).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error converting {} to {}: {}", input.display(), format, e);
                summary.failures.push(FailedConversion {
                    source: input.to_path_buf(),
                    format,
                    error: e.to_string(),
                });
                false
            }
        }
    }
}
