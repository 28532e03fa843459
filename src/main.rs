use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use docs2office::merger::{merge_markdown_files, DEFAULT_TITLE};
use docs2office::{ExportOptions, ExportSummary, Exporter, Pandoc};
use std::path::{Path, PathBuf};
use std::process;
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docs2office")]
#[command(about = "CLI utility to turn a markdown documentation tree into Word and PDF documents")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the docs and convert the merged and individual files to DOCX and PDF
    Convert {
        /// Directory containing the markdown documentation
        #[arg(default_value = "docs")]
        docs_dir: PathBuf,

        /// Output directory for Word documents (recreated on every run)
        #[arg(long = "word-dir", default_value = "exports/word")]
        word_dir: PathBuf,

        /// Output directory for PDF documents (recreated on every run)
        #[arg(long = "pdf-dir", default_value = "exports/pdf")]
        pdf_dir: PathBuf,

        /// Path of the merged markdown file
        #[arg(short = 'm', long = "merged", default_value = "exports/dfs_documentation.md")]
        merged_file: PathBuf,

        /// Title heading of the merged document
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// pandoc executable
        #[arg(long, default_value = "pandoc")]
        pandoc: PathBuf,

        /// PDF engine passed to pandoc
        #[arg(long = "pdf-engine", default_value = "xelatex")]
        pdf_engine: String,

        /// Directory pandoc extracts DOCX media into
        #[arg(long = "media-dir", default_value = "./media")]
        media_dir: PathBuf,

        /// Write a JSON summary of the run to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Only build the merged markdown file
    Merge {
        /// Directory containing the markdown documentation
        #[arg(default_value = "docs")]
        docs_dir: PathBuf,

        /// Output file path for the merged markdown
        #[arg(short = 'o', long = "output", default_value = "exports/dfs_documentation.md")]
        output_file: PathBuf,

        /// Title heading of the merged document
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
    },
}

async fn write_report(path: &Path, summary: &ExportSummary) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)
        .await
        .map_err(|e| anyhow!("Failed to write report to {}: {}", path.display(), e))?;
    info!("Report written to: {}", path.display().to_string().blue());
    Ok(())
}

fn print_summary(options: &ExportOptions, summary: &ExportSummary) {
    println!();
    println!("{}", "Conversion complete!".green().bold());
    println!("Successfully converted {} files to DOCX format.", summary.docx_converted);
    println!("Successfully converted {} files to PDF format.", summary.pdf_converted);
    if !summary.failures.is_empty() {
        println!("{}", format!("{} conversions failed.", summary.failures.len()).yellow());
    }
    println!();
    println!("Word documents are in: {}", absolute(&options.word_dir).blue());
    println!("PDF documents are in: {}", absolute(&options.pdf_dir).blue());
}

fn absolute(path: &Path) -> String {
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

async fn convert(options: ExportOptions, pandoc: Pandoc, report: Option<PathBuf>) -> Result<()> {
    let version = pandoc.version().await.map_err(|e| {
        anyhow!("pandoc is required but could not be run ({}): {}", pandoc.program().display(), e)
    })?;
    info!("Using {}", version.green());

    let exporter = Exporter::new(options, pandoc);
    let summary = exporter.run().await?;

    if let Some(path) = report {
        write_report(&path, &summary).await?;
    }

    print_summary(exporter.options(), &summary);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let filter = EnvFilter::from_default_env()
        .add_directive("docs2office=info".parse().expect("valid directive"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Convert {
            docs_dir,
            word_dir,
            pdf_dir,
            merged_file,
            title,
            pandoc,
            pdf_engine,
            media_dir,
            report,
        } => {
            let options = ExportOptions { docs_dir, word_dir, pdf_dir, merged_file, title };
            let pandoc = Pandoc::new(pandoc)
                .with_media_dir(media_dir)
                .with_pdf_engine(pdf_engine);
            convert(options, pandoc, report).await
        }
        Commands::Merge { docs_dir, output_file, title } => {
            merge_markdown_files(&docs_dir, &output_file, &title)
                .await
                .map(|path| println!("Created merged file: {}", path.display().to_string().green()))
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
