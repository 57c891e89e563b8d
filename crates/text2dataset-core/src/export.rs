//! Serialize labeled rows to CSV, JSON records or spaCy training data, and
//! read them back.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::dataset::{LabeledRow, OutputFormat};

const CSV_HEADER: [&str; 3] = ["text", "entity", "label"];
const MAX_NAME_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed {format} data: {message}")]
    Malformed {
        format: OutputFormat,
        message: String,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Entity annotations for one sentence: `(start, end, label)` in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacyAnnotations {
    pub entities: Vec<(usize, usize, String)>,
}

pub type SpacyExample = (String, SpacyAnnotations);

pub fn export(rows: &[LabeledRow], format: OutputFormat) -> ExportResult<Vec<u8>> {
    match format {
        OutputFormat::Csv => to_csv(rows),
        OutputFormat::Json => to_json(rows),
        OutputFormat::Spacy => to_spacy(rows),
    }
}

pub fn import(data: &[u8], format: OutputFormat) -> ExportResult<Vec<LabeledRow>> {
    match format {
        OutputFormat::Csv => parse_csv(data),
        OutputFormat::Json => parse_json(data),
        OutputFormat::Spacy => parse_spacy(data),
    }
}

pub fn to_csv(rows: &[LabeledRow]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([&row.text, &row.entity, &row.label])?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

pub fn parse_csv(data: &[u8]) -> ExportResult<Vec<LabeledRow>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(data);

    let headers = reader.headers()?;
    if headers.iter().ne(CSV_HEADER) {
        return Err(ExportError::Malformed {
            format: OutputFormat::Csv,
            message: format!("unexpected header {headers:?}"),
        });
    }

    reader
        .deserialize()
        .collect::<Result<Vec<LabeledRow>, _>>()
        .map_err(Into::into)
}

pub fn to_json(rows: &[LabeledRow]) -> ExportResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(rows)?)
}

pub fn parse_json(data: &[u8]) -> ExportResult<Vec<LabeledRow>> {
    Ok(serde_json::from_slice(data)?)
}

/// Group rows by sentence, first-seen order, with character offsets of the
/// first occurrence of each entity. Rows whose entity is not in the sentence
/// are dropped.
///
/// A sentence that appears more than once becomes a single example holding
/// the annotations of every occurrence. Importing such a file yields the same
/// rows, grouped by sentence rather than in their original order.
#[must_use]
pub fn spacy_examples(rows: &[LabeledRow]) -> Vec<SpacyExample> {
    let mut examples: Vec<SpacyExample> = Vec::new();

    for row in rows {
        let Some(byte_start) = row.text.find(&row.entity) else {
            tracing::debug!(entity = %row.entity, "Entity not found in sentence, skipping");
            continue;
        };
        let start = row.text[..byte_start].chars().count();
        let end = start + row.entity.chars().count();
        let annotation = (start, end, row.label.clone());

        match examples.iter_mut().find(|(text, _)| *text == row.text) {
            Some((_, annotations)) => annotations.entities.push(annotation),
            None => examples.push((
                row.text.clone(),
                SpacyAnnotations {
                    entities: vec![annotation],
                },
            )),
        }
    }
    examples
}

pub fn to_spacy(rows: &[LabeledRow]) -> ExportResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&spacy_examples(rows))?)
}

pub fn parse_spacy(data: &[u8]) -> ExportResult<Vec<LabeledRow>> {
    let examples: Vec<SpacyExample> = serde_json::from_slice(data)?;
    let mut rows = Vec::new();

    for (text, annotations) in examples {
        let chars: Vec<char> = text.chars().collect();
        for (start, end, label) in annotations.entities {
            if start > end || end > chars.len() {
                return Err(ExportError::Malformed {
                    format: OutputFormat::Spacy,
                    message: format!("span {start}..{end} out of range for {text:?}"),
                });
            }
            let entity: String = chars[start..end].iter().collect();
            rows.push(LabeledRow::new(text.clone(), entity, label));
        }
    }
    Ok(rows)
}

/// `dataset_{name}_{id}.{ext}`, or `dataset_{id}.{ext}` when the sanitized
/// name is empty.
#[must_use]
pub fn output_filename(custom_name: Option<&str>, id: Uuid, format: OutputFormat) -> String {
    let name = custom_name.map(sanitize_name).unwrap_or_default();
    let ext = format.extension();
    if name.is_empty() {
        format!("dataset_{id}.{ext}")
    } else {
        format!("dataset_{name}_{id}.{ext}")
    }
}

fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .take(MAX_NAME_LEN)
        .collect()
}
