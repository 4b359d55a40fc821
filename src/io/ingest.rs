//! Input ingest for well traces.
//!
//! Two layouts are supported:
//!
//! - **JSON**: an object mapping well id to `{ "cycles": [...], "rfu": [...] }`.
//!   Key order is preserved; `null` entries inside a sequence become `NaN`.
//! - **Wide CSV**: the first column is the cycle number, every further column
//!   is one well keyed by its header.
//!
//! Ingest is deliberately permissive about *content*: a well may be missing a
//! sequence or have mismatched lengths. Those are structural problems reported
//! by the pre-flight check (`io::validate`), not here. Ingest only fails when the
//! file itself cannot be read or parsed.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::domain::{InputFormat, WellSample};
use crate::error::AppError;

/// One well as read from the input, before the structural check.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWell {
    pub well_id: String,
    pub cycles: Option<Vec<f64>>,
    pub rfu: Option<Vec<f64>>,
}

impl From<WellSample> for RawWell {
    fn from(well: WellSample) -> Self {
        Self {
            well_id: well.well_id,
            cycles: Some(well.cycles),
            rfu: Some(well.rfu),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawWellJson {
    #[serde(default, deserialize_with = "nullable_series")]
    cycles: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "nullable_series")]
    rfu: Option<Vec<f64>>,
}

fn nullable_series<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<f64>>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|values| values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()))
}

/// Resolve `InputFormat::Auto` from the file extension.
pub fn resolve_format(path: &Path, format: InputFormat) -> InputFormat {
    match format {
        InputFormat::Auto => match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Csv,
        },
        other => other,
    }
}

/// Read all wells from a file.
pub fn load_wells(path: &Path, format: InputFormat) -> Result<Vec<RawWell>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open input '{}': {e}", path.display())))?;

    let format = resolve_format(path, format);
    let wells = match format {
        InputFormat::Json => read_wells_json(file)?,
        InputFormat::Csv | InputFormat::Auto => read_wells_csv(file)?,
    };
    debug!(path = %path.display(), ?format, wells = wells.len(), "input loaded");
    Ok(wells)
}

/// Parse the JSON well mapping.
pub fn read_wells_json<R: Read>(reader: R) -> Result<Vec<RawWell>, AppError> {
    let value: serde_json::Value =
        serde_json::from_reader(reader).map_err(|e| AppError::input(format!("Invalid JSON input: {e}")))?;

    let serde_json::Value::Object(map) = value else {
        return Err(AppError::input(
            "Invalid JSON input: expected an object mapping well ids to {cycles, rfu}.",
        ));
    };

    map.into_iter()
        .map(|(well_id, entry)| {
            let parsed: RawWellJson = serde_json::from_value(entry)
                .map_err(|e| AppError::input(format!("Well {well_id}: invalid entry: {e}")))?;
            Ok(RawWell {
                well_id,
                cycles: parsed.cycles,
                rfu: parsed.rfu,
            })
        })
        .collect()
}

/// Parse a wide CSV (cycle column followed by one column per well).
///
/// Blank cells become `NaN`. A row that stops short leaves the trailing wells
/// without a value for that cycle, which the pre-flight check reports as a
/// length mismatch.
pub fn read_wells_csv<R: Read>(reader: R) -> Result<Vec<RawWell>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();

    if headers.len() < 2 {
        return Err(AppError::input(
            "CSV input needs a cycle column followed by at least one well column.",
        ));
    }

    let well_ids: Vec<String> = headers.iter().skip(1).map(normalize_header_name).collect();
    let mut cycles = Vec::new();
    let mut rfu: Vec<Vec<f64>> = vec![Vec::new(); well_ids.len()];

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header line, lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::input(format!("CSV parse error on line {line}: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        cycles.push(parse_cell(&record, 0, line, &headers)?);
        for (col, series) in rfu.iter_mut().enumerate() {
            if col + 1 < record.len() {
                series.push(parse_cell(&record, col + 1, line, &headers)?);
            }
        }
    }

    Ok(well_ids
        .into_iter()
        .zip(rfu)
        .map(|(well_id, series)| RawWell {
            well_id,
            cycles: Some(cycles.clone()),
            rfu: Some(series),
        })
        .collect())
}

/// Case-preserving header cleanup: strip whitespace and a UTF-8 BOM.
fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. Well ids are case-sensitive, so only trim.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_cell(record: &StringRecord, col: usize, line: usize, headers: &StringRecord) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| {
        let column = headers.get(col).map(normalize_header_name).unwrap_or_default();
        AppError::input(format!(
            "CSV line {line}, column '{column}': '{raw}' is not a number."
        ))
    })
}
