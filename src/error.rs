use pyo3::exceptions::PyValueError;
use pyo3::PyErr;
use thiserror::Error;

/// Fatal input errors of the potential outcome estimator.
///
/// Identification gaps (a treatment never observed in a weighted group) are
/// not errors; they surface as NaN in the affected output slot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PotentialOutcomesError {
    #[error("`{name}` and `{reference}` must be same length, got {actual} and {expected}")]
    LengthMismatch {
        name: &'static str,
        reference: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Matching is empty, the number of groups must be positive")]
    EmptyMatching,

    #[error("Out of memory: cannot allocate accumulators for {n_groups} groups and {n_treatments} treatments")]
    OutOfMemory {
        n_groups: usize,
        n_treatments: usize,
    },

    #[error("Matching out of bounds: unit {unit} has group {group}, expected a value in [0, {n_groups})")]
    MatchingOutOfBounds {
        unit: usize,
        group: i64,
        n_groups: usize,
    },

    #[error("Treatment out of bounds: unit {unit} has treatment {treatment}, expected a value in [0, {n_treatments})")]
    TreatmentOutOfBounds {
        unit: usize,
        treatment: i64,
        n_treatments: usize,
    },
}

impl From<PotentialOutcomesError> for PyErr {
    fn from(err: PotentialOutcomesError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failed_precondition() {
        let err = PotentialOutcomesError::LengthMismatch {
            name: "matching",
            reference: "outcomes",
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "`matching` and `outcomes` must be same length, got 3 and 4"
        );

        let err = PotentialOutcomesError::MatchingOutOfBounds {
            unit: 2,
            group: 7,
            n_groups: 3,
        };
        assert!(err.to_string().starts_with("Matching out of bounds"));
        assert!(err.to_string().contains("unit 2"));

        let err = PotentialOutcomesError::TreatmentOutOfBounds {
            unit: 0,
            treatment: -1,
            n_treatments: 2,
        };
        assert!(err.to_string().starts_with("Treatment out of bounds"));
    }
}
