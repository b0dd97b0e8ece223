//! Dynamically Dimensioned Search (Tolson & Shoemaker) perturbation, plus
//! the uniform-random generator used to seed the initial runs.

use crate::params::{ParamDef, ParamTable, ParamValues};

/// Probability that any single parameter is selected for perturbation in
/// DDS run `run_idx` (1-based) of `total_runs`. Decays from near 1 toward
/// 0 as the run index approaches the total, shrinking the expected number
/// of simultaneously perturbed dimensions over the search horizon.
pub fn acceptance_probability(run_idx: usize, total_runs: usize) -> f64 {
    1.0 - (run_idx as f64).ln() / (total_runs as f64).ln()
}

/// Number of uniform-random seeding runs preceding the DDS phase when the
/// random initial-parameter strategy is selected: 0.5% of the budget,
/// rounded up.
pub fn init_run_count(total_runs: usize) -> usize {
    (0.005 * total_runs as f64).ceil() as usize
}

/// Draws every candidate value uniformly within its bounds. Used for the
/// initial seeding runs only; all parameters count as modified.
pub fn random_sweep(table: &ParamTable, values: &mut ParamValues, rng: &mut fastrand::Rng) {
    for (i, def) in table.defs().iter().enumerate() {
        values.test[i] = def.lower + rng.f64() * (def.upper - def.lower);
        values.modified[i] = true;
    }
}

/// One DDS perturbation of a group's parameter set.
///
/// Every candidate is reset to the accepted-best before perturbing, so the
/// search always departs from the best point rather than the last trial.
/// Each parameter is independently selected with probability
/// `accept_probability`; if the draw selects none, exactly one parameter
/// chosen uniformly at random is perturbed so no run is a no-op.
pub fn dds_perturb(
    table: &ParamTable,
    values: &mut ParamValues,
    accept_probability: f64,
    perturb_factor: f64,
    rng: &mut fastrand::Rng,
) {
    values.test.copy_from_slice(&values.best);
    values.modified.fill(false);

    if table.is_empty() {
        return;
    }

    let mut selected = 0usize;
    for (i, def) in table.defs().iter().enumerate() {
        if rng.f64() < accept_probability {
            selected += 1;
            values.test[i] = neighborhood_value(def, values.test[i], perturb_factor, rng);
            values.modified[i] = true;
        }
    }

    if selected == 0 {
        let i = rng.usize(0..table.len());
        values.test[i] = neighborhood_value(&table.defs()[i], values.test[i], perturb_factor, rng);
        values.modified[i] = true;
    }
}

/// Generates a neighboring value for one decision variable: a standard
/// normal deviate scaled by `perturb_factor` times the bound range, added
/// to the current value, with reflecting boundaries.
fn neighborhood_value(
    def: &ParamDef,
    current: f64,
    perturb_factor: f64,
    rng: &mut fastrand::Rng,
) -> f64 {
    let range = def.upper - def.lower;
    let z = polar_gaussian(rng);
    reflect(current + z * perturb_factor * range, def.lower, def.upper)
}

/// Standard normal deviate via the polar (Marsaglia) method: rejection
/// sample two uniforms in (-1, 1) until their squared norm lands in
/// (0, 1), then pick one of the two transformed deviates at random.
fn polar_gaussian(rng: &mut fastrand::Rng) -> f64 {
    loop {
        let w1 = 2.0 * rng.f64() - 1.0;
        let w2 = 2.0 * rng.f64() - 1.0;
        let norm = w1 * w1 + w2 * w2;
        if norm >= 1.0 || norm == 0.0 {
            continue;
        }
        let base = ((-2.0 * norm.ln()) / norm).sqrt();
        return if rng.f64() < 0.5 { base * w1 } else { base * w2 };
    }
}

/// Reflecting boundary rule. A value past a bound reflects off it; if the
/// reflection overshoots the opposite bound, the value clamps to the bound
/// it first crossed.
pub fn reflect(value: f64, lower: f64, upper: f64) -> f64 {
    if value < lower {
        let reflected = lower + (lower - value);
        if reflected > upper {
            lower
        } else {
            reflected
        }
    } else if value > upper {
        let reflected = upper - (value - upper);
        if reflected < lower {
            upper
        } else {
            reflected
        }
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_folds_back_into_bounds() {
        assert_eq!(reflect(-0.5, 0.0, 10.0), 0.5);
        assert_eq!(reflect(10.5, 0.0, 10.0), 9.5);
        assert_eq!(reflect(5.0, 0.0, 10.0), 5.0);
    }

    #[test]
    fn double_violation_clamps_to_the_crossed_bound() {
        assert_eq!(reflect(-15.0, 0.0, 10.0), 0.0);
        assert_eq!(reflect(25.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn schedule_decays_toward_zero() {
        let total = 1000;
        let mut last = f64::INFINITY;
        for run in 1..total {
            let p = acceptance_probability(run, total);
            assert!(p <= last);
            last = p;
        }
        assert!(acceptance_probability(1, total) > 0.9);
    }
}
