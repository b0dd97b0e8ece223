use crate::error::{DmResult, DmpotError};
use crate::objective::{SeriesSpec, TimeStep};
use crate::settings::{SimDate, SimWindow};
use std::fs;
use std::path::Path;

/// One observed series, already trimmed to the scoring window.
#[derive(Debug, Clone)]
pub struct ObservedSeries {
    pub spec: SeriesSpec,
    pub values: Vec<f64>,
}

/// Observed-data file name for an outlet at a given resolution,
/// e.g. `obs_monthly6.prn`.
pub fn obs_file_name(outlet: u32, step: TimeStep) -> String {
    format!("obs_{}{}.prn", step, outlet)
}

/// Reads the observed series for one calibration target and trims it to
/// the scoring window. The file is whitespace-separated with one header
/// line and columns `yyyy mm dd` followed by the flux columns.
///
/// A missing or unreadable file is fatal for the campaign, as is an
/// observation record that does not overlap the simulation window at all.
pub fn read_observed(dir: &Path, spec: &SeriesSpec, window: &SimWindow) -> DmResult<ObservedSeries> {
    let path = dir.join(obs_file_name(spec.outlet, spec.step));
    let content = fs::read_to_string(&path).map_err(|e| {
        DmpotError::Config(format!(
            "observed data file {} is unreadable: {}",
            path.display(),
            e
        ))
    })?;

    let value_col = 3 + spec.var.obs_column();
    let mut dates = Vec::new();
    let mut values = Vec::new();

    for (line_no, line) in content.lines().enumerate().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() <= value_col {
            return Err(DmpotError::Validation(format!(
                "{}:{}: expected at least {} columns, found {}",
                path.display(),
                line_no + 1,
                value_col + 1,
                fields.len()
            )));
        }
        let num = |idx: usize| -> DmResult<f64> {
            fields[idx].parse::<f64>().map_err(|_| {
                DmpotError::Validation(format!(
                    "{}:{}: '{}' is not a number",
                    path.display(),
                    line_no + 1,
                    fields[idx]
                ))
            })
        };
        let date = SimDate {
            year: num(0)? as i32,
            month: num(1)? as u32,
            day: num(2)? as u32,
        };
        dates.push(date);
        values.push((date, num(value_col)?));
    }

    if dates.is_empty() {
        return Err(DmpotError::Validation(format!(
            "{} holds no observation rows",
            path.display()
        )));
    }

    let obs_start = dates.first().copied().unwrap_or(window.start);
    let obs_end = dates.last().copied().unwrap_or(window.end);
    if window.start.truncate(spec.step) > obs_end.truncate(spec.step) {
        return Err(DmpotError::Config(format!(
            "{}: observations end before the scoring window starts",
            path.display()
        )));
    }
    if obs_start.truncate(spec.step) > window.end.truncate(spec.step) {
        return Err(DmpotError::Config(format!(
            "{}: observations start after the scoring window ends",
            path.display()
        )));
    }

    let trimmed = values
        .into_iter()
        .filter(|(date, _)| window.contains(*date, spec.step))
        .map(|(_, v)| v)
        .collect();

    Ok(ObservedSeries {
        spec: *spec,
        values: trimmed,
    })
}
