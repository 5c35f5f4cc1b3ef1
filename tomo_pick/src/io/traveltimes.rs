//! Plain-text travel-time exchange files: one whitespace-separated row
//! per pick, `trace_number travel_time uncertainty`, trace numbers
//! 1-based.

use std::path::Path;

use log::info;

use crate::error::{PickError, Result};
use crate::survey::{ReviewState, TraceSet};

/// One parsed data row, kept with its physical line number so apply
/// errors can point back into the file.
struct Row {
    line: usize,
    index: usize,
    tt: f64,
    et: f64,
}

/// Finds the pick file for `path`, retrying with the conventional
/// extensions appended. Three attempts, then the lookup fails naming
/// everything that was tried.
fn resolve_import_path(path: &str) -> Result<String> {
    let candidates = [path.to_string(), format!("{path}.dat"), format!("{path}.DAT")];
    for candidate in &candidates {
        if Path::new(candidate).is_file() {
            return Ok(candidate.clone());
        }
    }
    Err(PickError::ImportFileNotFound(candidates.join(", ")))
}

fn parse_rows(lines: &[String]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for (lineno, raw) in lines.iter().enumerate() {
        let line = lineno + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(PickError::validation(format!(
                "line {line}: expected 3 columns, got {}",
                fields.len()
            )));
        }
        let number: usize = fields[0].parse().map_err(|_| {
            PickError::validation(format!("line {line}: bad trace number '{}'", fields[0]))
        })?;
        let index = number.checked_sub(1).ok_or_else(|| {
            PickError::validation(format!("line {line}: trace numbers are 1-based"))
        })?;
        let tt: f64 = fields[1].parse().map_err(|_| {
            PickError::validation(format!("line {line}: bad travel time '{}'", fields[1]))
        })?;
        let et: f64 = fields[2].parse().map_err(|_| {
            PickError::validation(format!("line {line}: bad uncertainty '{}'", fields[2]))
        })?;
        rows.push(Row {
            line,
            index,
            tt,
            et,
        });
    }
    Ok(rows)
}

/// Applies a pick file to `traces` and returns the number of rows
/// applied. Each row commits a pick and its uncertainty and flags the
/// trace reviewed; traces the file never mentions keep their state.
///
/// The file is parsed up front and a row that fails to apply rolls the
/// annotation arrays back, so a bad file leaves the trace set as it
/// was.
pub fn import_traveltimes(path: &str, traces: &mut TraceSet) -> Result<usize> {
    let resolved = resolve_import_path(path)?;
    let lines = crate::io::read_lines(&resolved)?;
    let rows = parse_rows(&lines)?;

    let snapshot = (
        traces.tt.clone(),
        traces.et.clone(),
        traces.tt_done.clone(),
    );
    for row in &rows {
        let applied = traces
            .set_pick(row.index, row.tt)
            .and_then(|_| traces.set_uncertainty(row.index, row.et));
        if let Err(err) = applied {
            (traces.tt, traces.et, traces.tt_done) = snapshot;
            return Err(match err {
                PickError::Validation(msg) => {
                    PickError::validation(format!("line {}: {msg}", row.line))
                }
                other => other,
            });
        }
    }
    info!(
        "imported {} travel times into {} from {resolved}",
        rows.len(),
        traces.name
    );
    Ok(rows.len())
}

/// Writes one row per reviewed, picked trace in the import format, the
/// round-trip partner of [`import_traveltimes`]. Returns the number of
/// rows written.
pub fn export_traveltimes(path: &str, traces: &TraceSet) -> Result<usize> {
    let mut out = String::new();
    let mut count = 0;
    for index in 0..traces.ntrace() {
        if traces.tt_done[index] == ReviewState::Reviewed && traces.is_picked(index) {
            out.push_str(&format!(
                "{} {} {}\n",
                index + 1,
                traces.tt[index],
                traces.et[index]
            ));
            count += 1;
        }
    }
    crate::io::write_string(path, &out)?;
    info!("exported {count} travel times from {} to {path}", traces.name);
    Ok(count)
}
