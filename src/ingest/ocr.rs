//! OCR fallback for PDF pages with little or no extractable text.
//!
//! Rendering and recognition are delegated to external tools (`pdftoppm` and
//! `tesseract`); this module owns the language-hint resolution and the
//! page-image plumbing between the two. OCR is the last resort for a page, so
//! failures propagate instead of falling back further.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::types::OcrError;

/// Resolve configured language hints to the OCR engine's language string.
///
/// Hints go through a fixed table (`en` → `eng`, `pl` → `pol`); unknown hints
/// are dropped and duplicates removed while preserving order. An empty result
/// falls back to `eng`. Multiple codes are joined with `+` so the engine
/// searches all of them.
pub fn resolve_ocr_langs(hints: &[String]) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for hint in hints {
        let code = match hint.trim().to_lowercase().as_str() {
            "en" => "eng",
            "pl" => "pol",
            _ => continue,
        };
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    if codes.is_empty() {
        "eng".to_string()
    } else {
        codes.join("+")
    }
}

/// Converts a single PDF page into recognized text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Render page `page_index` (0-based) of `file_path` at `dpi` and
    /// recognize its text. The result is trimmed.
    async fn ocr_page(&self, file_path: &Path, page_index: u32, dpi: u32)
    -> Result<String, OcrError>;
}

/// OCR engine backed by the `pdftoppm` and `tesseract` command-line tools.
pub struct TesseractOcr {
    langs: String,
}

impl TesseractOcr {
    /// Build an engine searching the languages resolved from `language_hints`.
    pub fn new(language_hints: &[String]) -> Self {
        Self {
            langs: resolve_ocr_langs(language_hints),
        }
    }

    /// Language string passed to the recognition engine.
    pub fn langs(&self) -> &str {
        &self.langs
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn ocr_page(
        &self,
        file_path: &Path,
        page_index: u32,
        dpi: u32,
    ) -> Result<String, OcrError> {
        let path = file_path.display().to_string();
        let scratch = tempfile::tempdir().map_err(|source| OcrError::Io {
            path: path.clone(),
            source,
        })?;

        let page_number = (page_index + 1).to_string();
        let prefix = scratch.path().join("page");
        let render = Command::new("pdftoppm")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg("-png")
            .arg(file_path)
            .arg(&prefix)
            .output()
            .await
            .map_err(|err| OcrError::Render {
                path: path.clone(),
                page: page_index,
                detail: err.to_string(),
            })?;
        if !render.status.success() {
            return Err(OcrError::Render {
                path,
                page: page_index,
                detail: String::from_utf8_lossy(&render.stderr).trim().to_string(),
            });
        }

        // pdftoppm zero-pads the page suffix based on the document's page
        // count, so pick up whatever single image landed in the scratch
        // directory instead of reconstructing the name.
        let image = first_png(scratch.path())
            .map_err(|source| OcrError::Io {
                path: path.clone(),
                source,
            })?
            .ok_or_else(|| OcrError::MissingRaster {
                path: path.clone(),
                page: page_index,
            })?;

        let recognized = Command::new("tesseract")
            .arg(&image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.langs)
            .output()
            .await
            .map_err(|err| OcrError::Recognition {
                path: path.clone(),
                page: page_index,
                detail: err.to_string(),
            })?;
        if !recognized.status.success() {
            return Err(OcrError::Recognition {
                path,
                page: page_index,
                detail: String::from_utf8_lossy(&recognized.stderr)
                    .trim()
                    .to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&recognized.stdout)
            .trim()
            .to_string())
    }
}

fn first_png(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
