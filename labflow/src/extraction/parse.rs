//! Lenient parsing of the model's answer into an [`ExtractedReport`].
//!
//! Models are asked for a fixed JSON shape, but what comes back varies: the JSON may be wrapped
//! in a markdown fence, numbers may arrive as strings with comparators or thousands separators,
//! and dates come in whatever format the lab printed. Individual biomarker entries that cannot be
//! used are dropped rather than failing the whole report.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ExtractedReport, ExtractionError};
use crate::types::{Biomarker, BiomarkerFlag, Gender};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%B %d %Y", "%d %B %Y", "%Y/%m/%d"];

/// Find the JSON object in a model response, with or without a markdown fence around it.
fn extract_json_block(response: &str) -> Result<&str, ExtractionError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') {
                return Ok(block);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
    {
        return Ok(&trimmed[start..=end]);
    }

    Err(ExtractionError::MalformedResponse("no JSON object in response".to_string()))
}

/// First non-null value among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| object.get(*k)).find(|v| !v.is_null())
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(object, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a lab value: `5.4`, `"5.4"`, `"<0.5"`, `"1,200"`, `"5,4"`, `"12.3 mg/dL"`.
///
/// A comma followed by groups of exactly three digits is a thousands separator; any other single
/// comma is a decimal comma.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw
        .trim()
        .trim_start_matches(['<', '>', '=', '≤', '≥', '~'])
        .trim_start();

    let mut end = 0;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || c == '.' || c == ',' || ((c == '-' || c == '+') && i == 0) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    let number = trimmed[..end].trim_end_matches([',', '.']);

    let normalized = match (number.rfind(','), number.rfind('.')) {
        // Whichever separator comes last is the decimal point
        (Some(comma), Some(dot)) if comma > dot => number.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => number.replace(',', ""),
        (Some(_), None) => {
            let mut groups = number.split(',');
            let head = groups.next().unwrap_or_default().trim_start_matches(['-', '+']);
            let rest: Vec<&str> = groups.collect();
            // A leading zero never opens a thousands group, so "0,500" is a half
            let thousands = !head.is_empty()
                && head.len() <= 3
                && !head.starts_with('0')
                && rest.iter().all(|g| g.len() == 3);
            if thousands {
                number.replace(',', "")
            } else if rest.len() == 1 {
                number.replace(',', ".")
            } else {
                return None;
            }
        }
        (None, _) => number.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn numeric_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// Parse a date in any of the formats labs commonly print. ISO datetimes keep their date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // "2024-03-05T09:30:00Z" and similar
    match trimmed.as_bytes().get(10) {
        Some(b'T' | b't' | b' ') => NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn date_field(object: &Map<String, Value>, keys: &[&str]) -> Option<NaiveDate> {
    field(object, keys).and_then(Value::as_str).and_then(parse_date)
}

/// Split a printed reference range such as `"70-99"`, `"3.5 – 5.0"`, `"<200"` or `">40"`.
fn parse_reference_range(raw: &str) -> (Option<f64>, Option<f64>) {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix(['<', '≤']) {
        return (None, parse_numeric(rest));
    }
    if let Some(rest) = trimmed.strip_prefix(['>', '≥']) {
        return (parse_numeric(rest), None);
    }

    // Skip the first char so a leading minus sign is not taken as the separator
    let separator = trimmed
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '-' | '–' | '—'))
        .map(|(i, c)| (i, c.len_utf8()));

    match separator {
        Some((i, len)) => (parse_numeric(&trimmed[..i]), parse_numeric(&trimmed[i + len..])),
        None => (None, None),
    }
}

fn parse_biomarker(entry: &Value) -> Option<Biomarker> {
    let object = entry.as_object()?;
    let name = string_field(object, &["name", "biomarker", "test", "analyte"])?;
    let value = field(object, &["value", "result"]).and_then(numeric_field)?;
    let unit = string_field(object, &["unit", "units"]);

    let mut reference_min = field(object, &["reference_min", "ref_min", "range_min"]).and_then(numeric_field);
    let mut reference_max = field(object, &["reference_max", "ref_max", "range_max"]).and_then(numeric_field);
    if reference_min.is_none()
        && reference_max.is_none()
        && let Some(range) = string_field(object, &["reference_range", "range"])
    {
        (reference_min, reference_max) = parse_reference_range(&range);
    }

    let flag = string_field(object, &["flag", "status"]).and_then(|f| BiomarkerFlag::parse_lenient(&f));

    Some(Biomarker {
        name,
        value,
        unit,
        reference_min,
        reference_max,
        flag,
    })
}

/// Parse the model's message content into a report.
pub fn parse_extraction(content: &str) -> Result<ExtractedReport, ExtractionError> {
    let json = extract_json_block(content)?;
    let root: Value = serde_json::from_str(json).map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;
    let root = root
        .as_object()
        .ok_or_else(|| ExtractionError::MalformedResponse("expected a JSON object".to_string()))?;

    // Patient details either nested under "patient" or flat on the root
    let patient = root.get("patient").and_then(Value::as_object).unwrap_or(root);

    let patient_name = string_field(patient, &["name", "patient_name", "full_name"]);
    let date_of_birth = date_field(patient, &["date_of_birth", "dob", "birth_date"]);
    let gender = string_field(patient, &["gender", "sex"]).and_then(|g| Gender::parse_lenient(&g));
    let lab_test_date = date_field(root, &["lab_test_date", "test_date", "collection_date", "report_date"]);

    let entries = field(root, &["biomarkers", "results"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let biomarkers: Vec<Biomarker> = entries.iter().filter_map(parse_biomarker).collect();
    let skipped = entries.len() - biomarkers.len();
    if skipped > 0 {
        debug!(skipped, kept = biomarkers.len(), "Dropped unusable biomarker entries");
    }

    if biomarkers.is_empty() {
        return Err(ExtractionError::NoBiomarkers);
    }

    Ok(ExtractedReport {
        patient_name,
        date_of_birth,
        gender,
        lab_test_date,
        biomarkers,
    })
}
