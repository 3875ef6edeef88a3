use std::io::{Cursor, Read};

use bytes::Bytes;
use complyze_core::{Category, ClassificationResult};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::engine::classify;

/// A file is "bulk" iff its extracted text exceeds this length. Two
/// candidate thresholds existed in earlier callsites (`sensitivityPoints >
/// 100` vs. extracted-text length `> 5000`); this implements the
/// length-based rule (see DESIGN.md).
pub const BULK_TEXT_THRESHOLD: usize = 5000;

pub struct AttachmentResult {
    pub filename: String,
    pub sha256: String,
    pub byte_len: u64,
    pub extracted_len: usize,
    pub is_bulk: bool,
    pub classification: ClassificationResult,
    pub extraction_error: Option<String>,
}

pub struct AttachmentInspection {
    pub files: Vec<AttachmentResult>,
    pub aggregated_categories: Vec<Category>,
    pub max_sensitivity_score: u8,
    pub any_bulk: bool,
}

/// Walks a multipart body, extracting and classifying each part carrying a
/// `filename`. Extraction failures on one file never abort the others — the
/// surrounding request is forwarded regardless.
pub async fn inspect_multipart(body: Bytes, boundary: &str) -> AttachmentInspection {
    let mut multipart = multer::Multipart::new(futures_util::stream::once(async { Ok::<_, std::io::Error>(body) }), boundary);

    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "multipart parse error, stopping attachment walk");
                break;
            }
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(filename, error = %err, "failed to read attachment part");
                files.push(AttachmentResult {
                    filename,
                    sha256: String::new(),
                    byte_len: 0,
                    extracted_len: 0,
                    is_bulk: false,
                    classification: ClassificationResult::empty(),
                    extraction_error: Some(err.to_string()),
                });
                continue;
            }
        };

        files.push(inspect_one(&filename, &bytes));
    }

    aggregate(files)
}

fn inspect_one(filename: &str, bytes: &[u8]) -> AttachmentResult {
    let sha256 = hex::encode(Sha256::digest(bytes));
    match extract_text(filename, bytes) {
        Ok(text) => {
            let extracted_len = text.chars().count();
            AttachmentResult {
                filename: filename.to_string(),
                sha256,
                byte_len: bytes.len() as u64,
                extracted_len,
                is_bulk: extracted_len > BULK_TEXT_THRESHOLD,
                classification: classify(&text),
                extraction_error: None,
            }
        }
        Err(err) => {
            warn!(filename, error = %err, "attachment text extraction failed");
            AttachmentResult {
                filename: filename.to_string(),
                sha256,
                byte_len: bytes.len() as u64,
                extracted_len: 0,
                is_bulk: false,
                classification: ClassificationResult::empty(),
                extraction_error: Some(err),
            }
        }
    }
}

fn aggregate(files: Vec<AttachmentResult>) -> AttachmentInspection {
    let mut aggregated_categories: Vec<Category> = Vec::new();
    let mut max_sensitivity_score = 0u8;
    let mut any_bulk = false;

    for file in &files {
        for category in &file.classification.categories_detected {
            if *category != Category::None && !aggregated_categories.contains(category) {
                aggregated_categories.push(*category);
            }
        }
        max_sensitivity_score = max_sensitivity_score.max(file.classification.sensitivity_score);
        any_bulk |= file.is_bulk;
    }

    if aggregated_categories.is_empty() {
        aggregated_categories.push(Category::None);
    }

    AttachmentInspection {
        files,
        aggregated_categories,
        max_sensitivity_score,
        any_bulk,
    }
}

fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, String> {
    let extension = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string()),
        "docx" => extract_docx(bytes),
        "csv" => extract_csv(bytes),
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let reader = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| e.to_string())?;
    let mut document = archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?;
    let mut xml = String::new();
    document.read_to_string(&mut xml).map_err(|e| e.to_string())?;

    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut text = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Text(t)) => {
                text.push_str(&t.unescape().map_err(|e| e.to_string())?);
                text.push(' ');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(err.to_string()),
        }
        buf.clear();
    }
    Ok(text)
}

fn extract_csv(bytes: &[u8]) -> Result<String, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes);
    let mut text = String::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        text.push_str(&record.iter().collect::<Vec<_>>().join(" "));
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_extraction_passes_through() {
        let text = extract_text("notes.txt", b"hello world").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn csv_rows_join_into_text() {
        let csv_bytes = b"name,ssn\nJohn Doe,123-45-6789\n";
        let text = extract_text("records.csv", csv_bytes).unwrap();
        assert!(text.contains("123-45-6789"));
    }

    #[test]
    fn bulk_threshold_is_length_based() {
        let short = inspect_one("a.txt", b"short");
        assert!(!short.is_bulk);
        let long_bytes = "x".repeat(BULK_TEXT_THRESHOLD + 1);
        let long = inspect_one("b.txt", long_bytes.as_bytes());
        assert!(long.is_bulk);
    }

    #[test]
    fn aggregate_uses_max_score_across_files() {
        let low = inspect_one("a.txt", b"nothing interesting here");
        let high = inspect_one("b.txt", b"Patient SSN 123-45-6789, diagnosis hypertension");
        let inspection = aggregate(vec![low, high]);
        assert_eq!(
            inspection.max_sensitivity_score,
            inspection
                .files
                .iter()
                .map(|f| f.classification.sensitivity_score)
                .max()
                .unwrap()
        );
    }
}
