use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};
use walkdir::WalkDir;

/// A source file accepted for indexing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the walk root, `/`-separated
    pub relative_path: String,
    pub file_name: String,
    pub content: String,
    pub language: String,
}

const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "env",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
    ".vscode",
    ".idea",
    ".next",
    "dist",
    "build",
    "out",
    ".nuxt",
    "coverage",
    ".nyc_output",
    "target",
    "bin",
    "obj",
    ".gradle",
    ".mvn",
];

const SKIP_FILES: &[&str] = &[
    "package-lock.json",
    "package.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Pipfile.lock",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "environment.yml",
    "Dockerfile",
    ".gitignore",
    ".env",
    ".env.local",
    ".env.example",
];

const SKIP_PATTERNS: &[&str] = &[
    "*.config.js",
    "*.config.ts",
    "*.config.cjs",
    "*.config.mjs",
    "tsconfig*.json",
    "*.d.ts",
    "*.map",
    "*.min.js",
    "*.min.css",
    "webpack*.js",
    "rollup*.js",
    "vite*.js",
    "jest*.js",
    "*.lock",
    "*.log",
    "*.tmp",
    "*.cache",
    "*.env*",
];

const ALLOWED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "c", "cpp", "go", "rs", "php", "rb", "swift", "kt",
    "cs", "vb", "html", "css", "json", "xml", "yml", "yaml", "ipynb", "md", "txt", "sql", "csv",
];

/// Decides which files of an upload or clone are worth indexing.
pub struct FileFilter {
    skip_patterns: GlobSet,
}

impl FileFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            skip_patterns: build_globset(SKIP_PATTERNS)?,
        })
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        SKIP_DIRS.contains(&name)
    }

    /// True when `relative` passes the directory, file-name, pattern and
    /// extension rules.
    pub fn accepts(&self, relative: &Path) -> bool {
        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            // Every component but the last is a directory
            if components.peek().is_some() {
                if let Component::Normal(dir) = component {
                    if self.is_skipped_dir(&dir.to_string_lossy()) {
                        return false;
                    }
                }
            }
        }

        let Some(file_name) = relative.file_name().map(|f| f.to_string_lossy()) else {
            return false;
        };
        if SKIP_FILES.contains(&file_name.as_ref()) {
            return false;
        }
        if self.skip_patterns.is_match(file_name.as_ref()) {
            return false;
        }

        let ext = extension(relative);
        ALLOWED_EXTENSIONS.contains(&ext.as_str())
    }

    /// Walk `root` and read every accepted UTF-8 file.
    pub fn collect(&self, root: &Path) -> Vec<SourceFile> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && self.is_skipped_dir(&e.file_name().to_string_lossy()))
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(file) = self.read(root, entry.path()) {
                files.push(file);
            }
        }

        files
    }

    /// Read one file below `root` if the filter accepts it.
    pub fn read(&self, root: &Path, path: &Path) -> Option<SourceFile> {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if !self.accepts(relative) {
            return None;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                return None;
            }
        };
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                tracing::info!("Skipping {}: not valid UTF-8", relative.display());
                return None;
            }
        };

        let file_name = relative
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Some(SourceFile {
            relative_path,
            file_name,
            content,
            language: detect_language(path).to_string(),
        })
    }
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn detect_language(path: &Path) -> &'static str {
    match extension(path).as_str() {
        "py" | "ipynb" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "html" => "html",
        "css" => "css",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "sql" => "sql",
        "csv" => "csv",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" => "kotlin",
        "cs" => "csharp",
        "vb" => "vb",
        _ => "code",
    }
}
