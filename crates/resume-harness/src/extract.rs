//! Resume text extraction.
//!
//! Format selection is driven by the uploaded file's extension. Extraction
//! is a pure transform over bytes: plain text out, or an error and no
//! partial output.
//!
//! | Extension | Handling |
//! |-----------|----------|
//! | `.pdf` | `pdf-extract` over the raw bytes |
//! | `.docx` | ZIP + OOXML `w:t` run extraction |
//! | `.txt`, `.md` | UTF-8 (lossy) passthrough |
//! | `.doc` | rejected with a convert-to-docx message |
//! | other | rejected as unsupported |
//!
//! Archive handling lives here too: [`list_archive_entries`] opens a ZIP
//! and returns the entries whose extensions are accepted resume formats,
//! with everything else reported as skipped.

use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;

use resume_harness_core::error::PipelineError;

/// Extensions an archive entry may carry to be expanded into its own
/// document. `.doc` is accepted here and rejected later at extraction,
/// so the failure is recorded on the entry's document rather than
/// silently dropped at expansion time.
const ARCHIVE_ENTRY_EXTENSIONS: &[&str] = &["pdf", "docx", "doc"];

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb cap).
const MAX_ZIP_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from `bytes`, choosing the parser from `file_name`'s
/// extension. An extraction that yields only whitespace is a failure:
/// downstream steps need text to redact and chunk.
pub fn extract_text(bytes: &[u8], file_name: &str) -> Result<String, PipelineError> {
    let ext = file_extension(file_name)
        .ok_or_else(|| PipelineError::UnsupportedFormat(format!("{file_name}: no extension")))?;

    let text = match ext.as_str() {
        "pdf" => extract_pdf(bytes)?,
        "docx" => extract_docx(bytes)?,
        "txt" | "md" => String::from_utf8_lossy(bytes).into_owned(),
        "doc" => {
            return Err(PipelineError::UnsupportedFormat(
                "legacy .doc is not supported; convert the file to .docx or PDF".to_string(),
            ))
        }
        other => return Err(PipelineError::UnsupportedFormat(other.to_string())),
    };

    if text.trim().is_empty() {
        return Err(PipelineError::ExtractionFailed(
            "document contains no extractable text".to_string(),
        ));
    }
    Ok(text)
}

/// True when [`extract_text`] has a parser for this file name.
pub fn is_supported(file_name: &str) -> bool {
    matches!(
        file_extension(file_name).as_deref(),
        Some("pdf" | "docx" | "txt" | "md")
    )
}

/// MIME type recorded on the document for a given file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    match file_extension(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("doc") => "application/msword",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, PipelineError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("pdf: {e}")))
}

fn extract_docx(bytes: &[u8]) -> Result<String, PipelineError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::ExtractionFailed(format!("docx: {e}")))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| PipelineError::ExtractionFailed(format!("docx: word/document.xml: {e}")))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_ZIP_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| PipelineError::ExtractionFailed(format!("docx: {e}")))?;
    if doc_xml.len() as u64 >= MAX_ZIP_ENTRY_BYTES {
        return Err(PipelineError::ExtractionFailed(
            "docx: word/document.xml exceeds size limit".to_string(),
        ));
    }

    document_xml_text(&doc_xml)
}

/// Collect `w:t` run text from `word/document.xml`.
///
/// Paragraph ends and explicit breaks become newlines so section headers
/// keep their own lines; the metadata heuristics depend on that structure.
fn document_xml_text(xml: &[u8]) -> Result<String, PipelineError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(Event::Text(te)) = reader.read_event_into(&mut buf) {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" => out.push('\n'),
                b"tab" => out.push(' '),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::ExtractionFailed(format!("docx: {e}")));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// One file pulled out of an uploaded archive.
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Entry file name (path components stripped).
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of expanding an archive: accepted entries plus the names of
/// entries skipped for carrying a non-resume extension.
#[derive(Debug)]
pub struct ArchiveListing {
    pub entries: Vec<ArchiveEntry>,
    pub skipped: Vec<String>,
}

/// Open `bytes` as a ZIP and pull out every entry whose extension is an
/// accepted resume format. A corrupt archive fails extraction; individual
/// oversized entries do too, rather than being silently truncated.
pub fn list_archive_entries(bytes: &[u8]) -> Result<ArchiveListing, PipelineError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::ExtractionFailed(format!("archive: {e}")))?;

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PipelineError::ExtractionFailed(format!("archive: {e}")))?;
        if entry.is_dir() {
            continue;
        }

        let full_name = entry.name().to_string();
        let file_name = full_name
            .rsplit('/')
            .next()
            .unwrap_or(&full_name)
            .to_string();
        let accepted = file_extension(&file_name)
            .map(|ext| ARCHIVE_ENTRY_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !accepted {
            skipped.push(full_name);
            continue;
        }

        let mut bytes = Vec::new();
        (&mut entry)
            .take(MAX_ZIP_ENTRY_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| PipelineError::ExtractionFailed(format!("archive: {full_name}: {e}")))?;
        if bytes.len() as u64 >= MAX_ZIP_ENTRY_BYTES {
            return Err(PipelineError::ExtractionFailed(format!(
                "archive: {full_name} exceeds size limit"
            )));
        }
        entries.push(ArchiveEntry { file_name, bytes });
    }

    Ok(ArchiveListing { entries, skipped })
}
