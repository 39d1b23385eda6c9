//! Document loading: PDF and DOCX files into normalized page units.
//!
//! PDFs are read page by page; each page first goes through direct text
//! extraction, and pages whose text layer is too thin are handed to the OCR
//! fallback. DOCX files have no page concept and come back as a single unit.
//! All emitted text is normalized and every unit carries full provenance.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::normalize::normalize;
use super::ocr::OcrEngine;
use super::types::{LoadError, PageMeta, PageUnit};

/// Outcome of the two-stage extraction policy for a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// The direct text layer carries enough content.
    UseDirect,
    /// The page needs the OCR fallback.
    UseOcr,
}

/// Decide whether a page's directly extracted text is sufficient.
///
/// A page qualifies for direct use when its trimmed text reaches `min_chars`
/// characters; anything shorter is assumed to be a scanned or image-only page.
pub fn choose_extraction(direct_text: &str, min_chars: usize) -> Extraction {
    if direct_text.trim().chars().count() < min_chars {
        Extraction::UseOcr
    } else {
        Extraction::UseDirect
    }
}

/// Loads source files into page units, applying the OCR fallback policy.
pub struct DocumentLoader {
    allowed_exts: Vec<String>,
    ocr: Option<Arc<dyn OcrEngine>>,
    ocr_dpi: u32,
    ocr_min_chars: usize,
}

impl DocumentLoader {
    /// Build a loader for the given extension allow-list (lowercase, with
    /// leading dots). `ocr` of `None` disables the fallback entirely, in which
    /// case thin pages keep whatever direct text they have.
    pub fn new(
        allowed_exts: Vec<String>,
        ocr: Option<Arc<dyn OcrEngine>>,
        ocr_dpi: u32,
        ocr_min_chars: usize,
    ) -> Self {
        Self {
            allowed_exts,
            ocr,
            ocr_dpi,
            ocr_min_chars,
        }
    }

    /// Whether `path`'s extension is in the allow-list. Used by directory
    /// scans to skip foreign files without raising errors.
    pub fn is_allowed(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        !ext.is_empty() && self.allowed_exts.iter().any(|allowed| *allowed == ext)
    }

    /// Load `path` into page units, in page order.
    pub async fn load(&self, path: &Path) -> Result<Vec<PageUnit>, LoadError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(LoadError::FileNotFound { path: display });
        }

        let ext = extension_of(path);
        if !self.is_allowed(path) {
            return Err(LoadError::UnsupportedType { path: display, ext });
        }

        let absolute = std::path::absolute(path).map_err(|source| LoadError::Io {
            path: display.clone(),
            source,
        })?;
        let source = absolute.display().to_string();
        let source_name = absolute
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());
        let base = PageMeta {
            source,
            source_name,
            ext: ext.trim_start_matches('.').to_string(),
            page_start: 1,
            page_end: 1,
        };

        match base.ext.as_str() {
            "pdf" => self.load_pdf(path, base).await,
            "docx" => self.load_docx(path, base),
            _ => Err(LoadError::UnsupportedType { path: display, ext }),
        }
    }

    async fn load_pdf(&self, path: &Path, base: PageMeta) -> Result<Vec<PageUnit>, LoadError> {
        let display = path.display().to_string();
        let doc = lopdf::Document::load(path).map_err(|source| LoadError::Pdf {
            path: display,
            source,
        })?;

        let mut units = Vec::new();
        for page_number in doc.get_pages().keys().copied() {
            // Scanned pages routinely make the extractor error out; treat
            // that the same as an empty text layer.
            let direct = doc.extract_text(&[page_number]).unwrap_or_default();

            let (text, via_ocr) = match choose_extraction(&direct, self.ocr_min_chars) {
                Extraction::UseDirect => (direct, false),
                Extraction::UseOcr => match &self.ocr {
                    Some(engine) => {
                        let recognized =
                            engine.ocr_page(path, page_number - 1, self.ocr_dpi).await?;
                        (recognized, true)
                    }
                    None => (direct, false),
                },
            };

            units.push(PageUnit {
                text: normalize(&text),
                via_ocr,
                meta: PageMeta {
                    page_start: page_number,
                    page_end: page_number,
                    ..base.clone()
                },
            });
        }
        Ok(units)
    }

    fn load_docx(&self, path: &Path, base: PageMeta) -> Result<Vec<PageUnit>, LoadError> {
        let text = read_docx(path)?;
        Ok(vec![PageUnit {
            text: normalize(&text),
            via_ocr: false,
            meta: base,
        }])
    }
}

/// Lowercase extension of `path` with a leading dot, or empty when absent.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn read_docx(path: &Path) -> Result<String, LoadError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let mut archive =
        zip::ZipArchive::new(std::io::BufReader::new(file)).map_err(|err| LoadError::Docx {
            path: display.clone(),
            detail: format!("not a DOCX archive: {err}"),
        })?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|err| LoadError::Docx {
            path: display.clone(),
            detail: format!("missing document part: {err}"),
        })?
        .read_to_string(&mut xml)
        .map_err(|err| LoadError::Docx {
            path: display.clone(),
            detail: format!("unreadable document part: {err}"),
        })?;

    docx_body_text(&xml).map_err(|detail| LoadError::Docx {
        path: display,
        detail,
    })
}

/// Pull visible text out of WordprocessingML: the contents of `<w:t>` runs,
/// with a newline per paragraph and per explicit break.
fn docx_body_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = true,
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(element)) if element.local_name().as_ref() == b"br" => {
                out.push('\n');
            }
            Ok(Event::Text(node)) if in_text_run => {
                let piece = node
                    .unescape()
                    .map_err(|err| format!("invalid text node: {err}"))?;
                out.push_str(&piece);
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(format!("invalid XML: {err}")),
        }
    }
    Ok(out)
}
