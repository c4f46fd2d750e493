use pyo3::prelude::*;

pub mod error;
pub mod potential_outcomes;
pub mod treatment_effects;

pub use error::PotentialOutcomesError;
pub use potential_outcomes::{
    estimate_potential_outcomes, EstimatorConfig, MatchedSample, PotentialOutcomes, SubsetFilter,
};

#[pymodule]
fn _quickmatch_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_wrapped(wrap_pyfunction!(potential_outcomes::_potential_outcomes_rs))?;
    m.add_wrapped(wrap_pyfunction!(treatment_effects::_treatment_effects_rs))?;
    Ok(())
}
