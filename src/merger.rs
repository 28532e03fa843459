use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_TITLE: &str = "Detailed Functional Specification Documentation";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Recursively collects every `*.md` file below `dir`, sorted by path.
///
/// Hidden files and directories are skipped, like a shell glob would.
pub fn collect_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("Docs directory '{}' does not exist", dir.display()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| anyhow!("Failed to walk {}: {}", dir.display(), e))?;
        if entry.file_type().is_file() && has_markdown_name(entry.path()) {
            files.push(entry.into_path());
        }
    }

    // Sort on the string form so "a.md" comes before "a/b.md" on every platform
    files.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));

    debug!(count = files.len(), dir = %dir.display(), "Collected markdown files");
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn has_markdown_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".md"))
        .unwrap_or(false)
}

/// Builds a section heading from a file name: `getting-started.md` becomes
/// `Getting Started`.
pub fn section_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    title_case(&stem.replace('-', " "))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

pub struct MarkdownMerger {
    title: String,
    sections: Vec<String>,
}

impl MarkdownMerger {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub async fn add_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read markdown file {}: {}", path.display(), e))?
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        self.add_section(&section_title(path), &content);
        debug!(path = %path.display(), bytes = content.len(), "Added markdown section");
        Ok(())
    }

    /// Appends one section. A leading `# ` heading in `content` replaces the
    /// generated `## {fallback_title}` heading.
    pub fn add_section(&mut self, fallback_title: &str, content: &str) {
        let mut section = String::new();

        match content.split_once('\n') {
            Some((first, rest)) if first.starts_with("# ") => {
                section.push_str(first);
                section.push_str("\n\n");
                section.push_str(rest);
            }
            None if content.starts_with("# ") => {
                section.push_str(content);
                section.push_str("\n\n");
            }
            _ => {
                section.push_str(&format!("## {}\n\n", fallback_title));
                section.push_str(content);
            }
        }

        section.push_str(SECTION_SEPARATOR);
        self.sections.push(section);
    }

    pub fn render(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for section in &self.sections {
            out.push_str(section);
        }
        out
    }

    pub async fn save(&self, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
        }

        fs::write(output_path, self.render())
            .await
            .map_err(|e| anyhow!("Failed to write merged file {}: {}", output_path.display(), e))?;

        Ok(())
    }
}

impl Default for MarkdownMerger {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE)
    }
}

/// Merges every markdown file below `dir` into `output_file`.
pub async fn merge_markdown_files(dir: &Path, output_file: &Path, title: &str) -> Result<PathBuf> {
    let files = collect_markdown_files(dir)?;

    let mut merger = MarkdownMerger::new(title);
    for path in &files {
        merger.add_file(path).await?;
    }
    merger.save(output_file).await?;

    info!(sections = merger.len(), "Created merged file: {}", output_file.display());
    Ok(output_file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_title_title_cases_hyphenated_stems() {
        assert_eq!(section_title(Path::new("docs/getting-started.md")), "Getting Started");
        assert_eq!(section_title(Path::new("API-reference.md")), "Api Reference");
        assert_eq!(section_title(Path::new("api-v2ref.md")), "Api V2Ref");
        assert_eq!(section_title(Path::new("under_score.md")), "Under_Score");
    }

    #[test]
    fn rendered_output_starts_with_title_heading() {
        let merger = MarkdownMerger::default();
        assert_eq!(
            merger.render(),
            "# Detailed Functional Specification Documentation\n\n"
        );
    }

    #[test]
    fn leading_heading_replaces_generated_one() {
        let mut merger = MarkdownMerger::new("Docs");
        merger.add_section("Intro", "# Welcome\nBody text\n");

        assert_eq!(merger.render(), "# Docs\n\n# Welcome\n\nBody text\n\n\n---\n\n");
    }

    #[test]
    fn generated_heading_used_without_top_level_heading() {
        let mut merger = MarkdownMerger::new("Docs");
        merger.add_section("Setup Guide", "## Install\nrun it");

        assert_eq!(
            merger.render(),
            "# Docs\n\n## Setup Guide\n\n## Install\nrun it\n\n---\n\n"
        );
    }

    #[test]
    fn single_line_heading_is_kept() {
        let mut merger = MarkdownMerger::new("Docs");
        merger.add_section("Only", "# Only heading");

        assert_eq!(merger.render(), "# Docs\n\n# Only heading\n\n\n\n---\n\n");
    }

    #[test]
    fn empty_file_gets_generated_heading() {
        let mut merger = MarkdownMerger::new("Docs");
        merger.add_section("Empty", "");

        assert_eq!(merger.render(), "# Docs\n\n## Empty\n\n\n\n---\n\n");
        assert_eq!(merger.len(), 1);
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(docs.join(".hidden")).unwrap();
        std::fs::create_dir_all(docs.join("guide")).unwrap();
        std::fs::write(docs.join(".hidden/x.md"), "secret").unwrap();
        std::fs::write(docs.join(".draft.md"), "draft").unwrap();
        std::fs::write(docs.join("guide/setup.md"), "setup").unwrap();
        std::fs::write(docs.join("intro.md"), "intro").unwrap();
        std::fs::write(docs.join("notes.txt"), "not markdown").unwrap();

        let files = collect_markdown_files(&docs).unwrap();

        assert_eq!(files, vec![docs.join("guide/setup.md"), docs.join("intro.md")]);
    }

    #[tokio::test]
    async fn crlf_line_endings_are_normalised() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("windows-notes.md");
        std::fs::write(&path, "# Notes\r\nline one\r\nline two\r\n").unwrap();

        let mut merger = MarkdownMerger::new("Docs");
        merger.add_file(&path).await.unwrap();

        assert_eq!(
            merger.render(),
            "# Docs\n\n# Notes\n\nline one\nline two\n\n\n---\n\n"
        );
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let mut merger = MarkdownMerger::new("Docs");
        merger.add_section("Tags", "#hashtag\nmore");

        assert!(merger.render().contains("## Tags\n\n#hashtag\nmore"));
    }
}
