use ndarray::{Array2, ArrayView1};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1};
use pyo3::prelude::*;

use crate::potential_outcomes::PotentialOutcomes;

fn treatment_effects_impl(means: &ArrayView1<f64>) -> Array2<f64> {
    let k = means.len();
    Array2::from_shape_fn((k, k), |(i, j)| means[i] - means[j])
}

/// Pairwise treatment effects between all estimated arms.
///
/// Entry `(i, j)` is the effect of treatment `i` relative to treatment `j`,
/// `mean[i] - mean[j]`. The matrix is antisymmetric; rows and columns of an
/// undefined arm are NaN.
pub fn treatment_effects(outcomes: &PotentialOutcomes) -> Array2<f64> {
    treatment_effects_impl(&outcomes.means.view())
}

/// Effect of `treatment` relative to `control`, if both means are defined.
pub fn average_effect(
    outcomes: &PotentialOutcomes,
    treatment: usize,
    control: usize,
) -> Option<f64> {
    Some(outcomes.get(treatment)? - outcomes.get(control)?)
}

/// Compute the matrix of pairwise treatment effects.
///
/// Parameters
/// ----------
/// means : numpy.ndarray (float64), shape (n_treatments,)
///     Estimated mean potential outcome per treatment, NaN if undefined.
///
/// Returns
/// -------
/// effects : numpy.ndarray (float64), shape (n_treatments, n_treatments)
///     `effects[i, j] = means[i] - means[j]`.
#[pyfunction]
pub fn _treatment_effects_rs(py: Python, means: PyReadonlyArray1<f64>) -> Py<PyArray2<f64>> {
    let effects = treatment_effects_impl(&means.as_array());
    effects.into_pyarray(py).unbind()
}
