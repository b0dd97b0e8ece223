use crate::error::{DmResult, DmpotError};
use crate::graph::ReachId;
use crate::objective::{FluxVar, TimeStep};
use std::fs;
use std::path::Path;

/// File the simulator writes its per-reach results into.
pub const REACH_OUTPUT_FILE: &str = "output.rch";

const HEADER_LINES: usize = 9;
const FLUX_COLUMNS: usize = 10;

// Byte layout of a data row: 5-char record tag, reach id (6), gis id (9),
// period (6), then twelve-char float columns (area first, then fluxes).
const REACH_FIELD: (usize, usize) = (5, 11);
const GIS_FIELD: (usize, usize) = (11, 20);
const PERIOD_FIELD: (usize, usize) = (20, 26);
const FLOAT_WIDTH: usize = 12;
const FLOATS_START: usize = 26;

/// One data row of the reach output file.
#[derive(Debug, Clone)]
pub struct ReachRecord {
    pub reach: ReachId,
    pub gis: u32,
    pub period: u32,
    pub area_km2: f64,
    pub fluxes: [f64; FLUX_COLUMNS],
}

/// Parses the fixed-width reach output file.
///
/// Monthly and annual output carries a trailing per-reach summary block
/// (one row per reach) that is dropped here; monthly output additionally
/// tags summary rows with a period past December, so any row with
/// period > 12 is dropped as well.
pub fn read_reach_output(
    path: &Path,
    step: TimeStep,
    reach_count: usize,
) -> DmResult<Vec<ReachRecord>> {
    let content = fs::read_to_string(path)?;

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate().skip(HEADER_LINES) {
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_row(line, path, line_no + 1)?);
    }

    if matches!(step, TimeStep::Monthly | TimeStep::Annual) {
        let keep = records.len().saturating_sub(reach_count);
        records.truncate(keep);
    }
    if step == TimeStep::Monthly {
        records.retain(|r| r.period <= 12);
    }

    Ok(records)
}

fn parse_row(line: &str, path: &Path, line_no: usize) -> DmResult<ReachRecord> {
    let field = |start: usize, end: usize| -> &str {
        let bytes = line.as_bytes();
        let end = end.min(bytes.len());
        if start >= end {
            ""
        } else {
            std::str::from_utf8(&bytes[start..end]).unwrap_or("").trim()
        }
    };
    let bad = |what: &str, text: &str| {
        DmpotError::Validation(format!(
            "{}:{}: '{}' is not a valid {}",
            path.display(),
            line_no,
            text,
            what
        ))
    };

    let reach = field(REACH_FIELD.0, REACH_FIELD.1)
        .parse::<ReachId>()
        .map_err(|_| bad("reach id", field(REACH_FIELD.0, REACH_FIELD.1)))?;
    let gis = field(GIS_FIELD.0, GIS_FIELD.1)
        .parse::<u32>()
        .map_err(|_| bad("gis id", field(GIS_FIELD.0, GIS_FIELD.1)))?;
    let period = field(PERIOD_FIELD.0, PERIOD_FIELD.1)
        .parse::<u32>()
        .map_err(|_| bad("period", field(PERIOD_FIELD.0, PERIOD_FIELD.1)))?;

    let float_at = |idx: usize| -> DmResult<f64> {
        let start = FLOATS_START + idx * FLOAT_WIDTH;
        let text = field(start, start + FLOAT_WIDTH);
        text.parse::<f64>().map_err(|_| bad("flux value", text))
    };

    let area_km2 = float_at(0)?;
    let mut fluxes = [0.0; FLUX_COLUMNS];
    for (i, flux) in fluxes.iter_mut().enumerate() {
        *flux = float_at(i + 1)?;
    }

    Ok(ReachRecord {
        reach,
        gis,
        period,
        area_km2,
        fluxes,
    })
}

/// The simulated series for one outlet and variable, in file order.
/// Returns an empty series when the outlet never appears (a failed or
/// truncated simulator run), which the statistics engine converts into
/// sentinel scores.
pub fn extract_series(records: &[ReachRecord], outlet: ReachId, var: FluxVar) -> Vec<f64> {
    let Some(col) = var.rch_column() else {
        return Vec::new();
    };
    records
        .iter()
        .filter(|r| r.reach == outlet)
        .map(|r| r.fluxes[col])
        .collect()
}

/// Renders one data row in the same fixed-width layout `read_reach_output`
/// parses. Test fixtures and the round-trip checks use this.
pub fn format_row(record: &ReachRecord) -> String {
    let mut line = format!(
        "REACH{:>6}{:>9}{:>6}{:>12.4}",
        record.reach, record.gis, record.period, record.area_km2
    );
    for flux in &record.fluxes {
        line.push_str(&format!("{:>12.4E}", flux));
    }
    line
}
