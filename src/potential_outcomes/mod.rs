//! Matched-group estimator of average potential outcomes.
//!
//! For every requested treatment level `t` the estimator averages, across
//! matched groups, each group's mean outcome under `t`, weighting a group by
//! how many of its units count toward the target population:
//!
//! ```text
//! mean[t] = sum_g  w[g] * (sum of outcomes in g under t) / (units in g under t)
//!           -------------------------------------------------------------------
//!                                     sum_g w[g]
//! ```
//!
//! Without filters `w[g]` is the number of matched units in `g` (ATE
//! weighting). With a [`SubsetFilter`] only flagged units contribute to
//! `w[g]`, which gives conditional estimands such as the effect on the
//! treated. If a group with positive weight has no unit under `t`, the
//! estimand is not identified and `mean[t]` is NaN.
//!
//! # Module Structure
//!
//! - [`types`]: Input views, filters, configuration and the result type
//! - `accumulator`: Per-group counters in flat `(treatment, group)` arenas

mod accumulator;
pub mod types;

use accumulator::GroupAccumulator;
pub use types::{EstimatorConfig, MatchedSample, PotentialOutcomes, SubsetFilter, MISSING_GROUP};

use log::{debug, trace};
use ndarray::{Array1, ArrayView1};
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use rayon::prelude::*;

use crate::error::PotentialOutcomesError;

/// Estimate the mean potential outcome for every wanted treatment slot.
///
/// # Arguments
///
/// * `sample` - Outcomes, group ids and treatment ids of all units
/// * `estimands` - One flag per treatment slot; unwanted slots come back as NaN
/// * `subset` - Which units count toward the cross-group weighting
/// * `config` - Execution parameters
///
/// # Errors
///
/// Fails without partial output if a filter has the wrong length, or if a
/// matched unit has a group id outside `[0, G)` or a treatment id outside
/// `[0, T)` where `T = estimands.len()`. Accumulators too large to allocate
/// for `G` groups and `T` slots give [`PotentialOutcomesError::OutOfMemory`].
pub fn estimate_potential_outcomes(
    sample: &MatchedSample,
    estimands: ArrayView1<bool>,
    subset: &SubsetFilter,
    config: &EstimatorConfig,
) -> Result<PotentialOutcomes, PotentialOutcomesError> {
    let n_treatments = estimands.len();
    subset.validate(sample.n_units(), n_treatments)?;

    let parallel = config.use_parallel(sample.n_units());
    let acc = if parallel {
        trace!("scanning {} units on the rayon pool", sample.n_units());
        GroupAccumulator::scan_par(sample, subset, n_treatments)?
    } else {
        GroupAccumulator::scan(sample, subset, n_treatments)?
    };

    let total_weight = acc.total_weight();
    debug!(
        "scanned {} units into {} groups for {} treatments, total weight {} ({})",
        sample.n_units(),
        sample.n_groups(),
        n_treatments,
        total_weight,
        if subset.is_ate() { "ATE weighting" } else { "subset weighting" },
    );

    let mean_for = |t: usize| {
        if estimands[t] {
            acc.weighted_mean(t, total_weight)
        } else {
            f64::NAN
        }
    };

    let means: Array1<f64> = if parallel {
        Array1::from(
            (0..n_treatments)
                .into_par_iter()
                .map(mean_for)
                .collect::<Vec<f64>>(),
        )
    } else {
        (0..n_treatments).map(mean_for).collect()
    };

    Ok(PotentialOutcomes {
        means,
        total_weight,
        n_groups: sample.n_groups(),
    })
}

/// Python passes the group count as a signed integer; a non-positive count
/// maps to zero so that it is rejected as an empty matching.
fn group_count_from_py(n_groups: Option<i64>) -> Option<usize> {
    n_groups.map(|g| usize::try_from(g).unwrap_or(0))
}

/// Estimate average potential outcomes from a matching.
///
/// Parameters
/// ----------
/// outcomes : numpy.ndarray (float64), shape (n_obs,)
///     Observed outcome of each unit. NaN outcomes propagate into the
///     means of the treatments they belong to.
/// matching : numpy.ndarray (int64), shape (n_obs,)
///     Matched group of each unit, in [0, n_groups), or `missing_group`
///     for units that were not matched.
/// treatments : numpy.ndarray (int64), shape (n_obs,)
///     Treatment of each unit, in [0, n_treatments).
/// estimands : numpy.ndarray (bool), shape (n_treatments,)
///     Which treatment means to estimate.
/// subset_indicators : numpy.ndarray (bool), shape (n_obs,), optional
///     Units that count toward the weighting.
/// subset_treatments : numpy.ndarray (bool), shape (n_treatments,), optional
///     Treatments whose units count toward the weighting. Combined with
///     `subset_indicators` by logical OR. Without either filter every
///     matched unit counts.
/// n_groups : int, optional
///     Number of matched groups. Inferred from `matching` when omitted.
///     Zero or negative values raise the empty-matching error.
/// missing_group : int, optional
///     Sentinel for unmatched units (default: -1).
/// parallel : bool, optional
///     Allow multi-threaded estimation on large inputs (default: True).
///
/// Returns
/// -------
/// means : numpy.ndarray (float64), shape (n_treatments,)
///     Estimated mean potential outcome per treatment; NaN where not
///     requested or not identified.
///
/// Raises
/// ------
/// ValueError
///     On length mismatches, an empty matching, out-of-bounds group or
///     treatment ids, or a group count too large to allocate.
#[pyfunction]
#[pyo3(signature = (
    outcomes,
    matching,
    treatments,
    estimands,
    subset_indicators=None,
    subset_treatments=None,
    n_groups=None,
    missing_group=MISSING_GROUP,
    parallel=true
))]
#[allow(clippy::too_many_arguments)]
pub fn _potential_outcomes_rs<'py>(
    py: Python<'py>,
    outcomes: PyReadonlyArray1<'py, f64>,
    matching: PyReadonlyArray1<'py, i64>,
    treatments: PyReadonlyArray1<'py, i64>,
    estimands: PyReadonlyArray1<'py, bool>,
    subset_indicators: Option<PyReadonlyArray1<'py, bool>>,
    subset_treatments: Option<PyReadonlyArray1<'py, bool>>,
    n_groups: Option<i64>,
    missing_group: i64,
    parallel: bool,
) -> PyResult<Bound<'py, PyArray1<f64>>> {
    let n_groups = group_count_from_py(n_groups);

    let sample = MatchedSample::with_missing_sentinel(
        outcomes.as_array(),
        matching.as_array(),
        treatments.as_array(),
        n_groups,
        missing_group,
    )?;
    let subset = SubsetFilter {
        units: subset_indicators.as_ref().map(|s| s.as_array()),
        treatments: subset_treatments.as_ref().map(|s| s.as_array()),
    };
    let config = EstimatorConfig {
        parallel,
        ..EstimatorConfig::default()
    };
    let estimands = estimands.as_array();

    let result = py.detach(|| estimate_potential_outcomes(&sample, estimands, &subset, &config))?;
    Ok(result.means.into_pyarray(py))
}
