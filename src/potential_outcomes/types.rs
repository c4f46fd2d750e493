//! Input and output types for the potential outcome estimator.
//!
//! # Main Types
//!
//! - [`MatchedSample`]: Aligned per-unit views (outcome, group, treatment) plus the group count
//! - [`SubsetFilter`]: Optional unit-level and treatment-level weighting filters
//! - [`EstimatorConfig`]: Execution parameters (parallelism)
//! - [`PotentialOutcomes`]: One estimated mean per treatment slot

use ndarray::{Array1, ArrayView1};

use crate::error::PotentialOutcomesError;

/// Group id marking a unit that failed to match.
///
/// Units with this group id are skipped entirely: they enter neither the
/// weighting nor the per-group outcome sums.
pub const MISSING_GROUP: i64 = -1;

// =============================================================================
// MatchedSample
// =============================================================================

/// Per-unit data of a matched study.
///
/// All three arrays are indexed by unit. Group ids are dense in `[0, n_groups)`
/// or equal to the missing sentinel. Treatment ids are checked against the
/// number of estimand slots during estimation, not here.
#[derive(Clone, Copy, Debug)]
pub struct MatchedSample<'a> {
    pub(crate) outcomes: ArrayView1<'a, f64>,
    pub(crate) groups: ArrayView1<'a, i64>,
    pub(crate) treatments: ArrayView1<'a, i64>,
    pub(crate) n_groups: usize,
    pub(crate) missing_group: i64,
}

impl<'a> MatchedSample<'a> {
    /// Create a sample using [`MISSING_GROUP`] for unmatched units.
    ///
    /// `n_groups` of `None` infers the group count as the largest valid
    /// group id plus one.
    pub fn new(
        outcomes: ArrayView1<'a, f64>,
        groups: ArrayView1<'a, i64>,
        treatments: ArrayView1<'a, i64>,
        n_groups: Option<usize>,
    ) -> Result<Self, PotentialOutcomesError> {
        Self::with_missing_sentinel(outcomes, groups, treatments, n_groups, MISSING_GROUP)
    }

    /// Create a sample with a custom sentinel for unmatched units.
    ///
    /// # Errors
    ///
    /// - [`PotentialOutcomesError::LengthMismatch`] if the arrays differ in length
    /// - [`PotentialOutcomesError::EmptyMatching`] if the group count is zero,
    ///   whether given explicitly or inferred from a sample without valid group ids
    pub fn with_missing_sentinel(
        outcomes: ArrayView1<'a, f64>,
        groups: ArrayView1<'a, i64>,
        treatments: ArrayView1<'a, i64>,
        n_groups: Option<usize>,
        missing_group: i64,
    ) -> Result<Self, PotentialOutcomesError> {
        check_length("matching", "outcomes", outcomes.len(), groups.len())?;
        check_length("treatments", "outcomes", outcomes.len(), treatments.len())?;

        let n_groups = n_groups.unwrap_or_else(|| infer_n_groups(&groups, missing_group));
        if n_groups == 0 {
            return Err(PotentialOutcomesError::EmptyMatching);
        }

        Ok(Self {
            outcomes,
            groups,
            treatments,
            n_groups,
            missing_group,
        })
    }

    /// Number of units (N), including unmatched ones.
    pub fn n_units(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of matched groups (G).
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Number of units carrying the missing group sentinel.
    pub fn n_unmatched(&self) -> usize {
        self.groups
            .iter()
            .filter(|&&g| g == self.missing_group)
            .count()
    }

    #[inline]
    pub(crate) fn is_missing(&self, group: i64) -> bool {
        group == self.missing_group
    }
}

/// Largest non-negative, non-missing group id plus one; zero if there is none.
fn infer_n_groups(groups: &ArrayView1<i64>, missing_group: i64) -> usize {
    groups
        .iter()
        .filter(|&&g| g != missing_group)
        .filter_map(|&g| usize::try_from(g).ok())
        .max()
        .map_or(0, |g| g + 1)
}

pub(crate) fn check_length(
    name: &'static str,
    reference: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), PotentialOutcomesError> {
    if expected != actual {
        return Err(PotentialOutcomesError::LengthMismatch {
            name,
            reference,
            expected,
            actual,
        });
    }
    Ok(())
}

// =============================================================================
// SubsetFilter
// =============================================================================

/// Filters deciding which units count toward the cross-group weighting.
///
/// With neither filter set every unit counts (ATE weighting). Otherwise a
/// unit counts if its own flag is set OR the flag of its treatment is set.
/// Filters never affect the within-group outcome means.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubsetFilter<'a> {
    /// One flag per unit.
    pub units: Option<ArrayView1<'a, bool>>,
    /// One flag per treatment slot.
    pub treatments: Option<ArrayView1<'a, bool>>,
}

impl<'a> SubsetFilter<'a> {
    /// No filtering: every matched unit is weighted.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn units(mask: ArrayView1<'a, bool>) -> Self {
        Self {
            units: Some(mask),
            treatments: None,
        }
    }

    /// Weight by the units assigned to the flagged treatments.
    ///
    /// Flagging only the treated arm gives the effect on the treated (ATT).
    pub fn treatments(mask: ArrayView1<'a, bool>) -> Self {
        Self {
            units: None,
            treatments: Some(mask),
        }
    }

    pub fn both(units: ArrayView1<'a, bool>, treatments: ArrayView1<'a, bool>) -> Self {
        Self {
            units: Some(units),
            treatments: Some(treatments),
        }
    }

    /// True when no filter is set.
    pub fn is_ate(&self) -> bool {
        self.units.is_none() && self.treatments.is_none()
    }

    pub(crate) fn validate(
        &self,
        n_units: usize,
        n_treatments: usize,
    ) -> Result<(), PotentialOutcomesError> {
        if let Some(units) = self.units {
            check_length("subset_indicators", "outcomes", n_units, units.len())?;
        }
        if let Some(treatments) = self.treatments {
            check_length(
                "subset_treatments",
                "estimands",
                n_treatments,
                treatments.len(),
            )?;
        }
        Ok(())
    }

    /// Whether `unit`, assigned `treatment`, counts toward the weighting.
    ///
    /// Indices must already be validated.
    #[inline]
    pub(crate) fn includes(&self, unit: usize, treatment: usize) -> bool {
        match (self.units, self.treatments) {
            (None, None) => true,
            (units, treatments) => {
                units.is_some_and(|u| u[unit]) || treatments.is_some_and(|t| t[treatment])
            }
        }
    }
}

// =============================================================================
// EstimatorConfig
// =============================================================================

/// Execution parameters for [`estimate_potential_outcomes`](super::estimate_potential_outcomes).
#[derive(Clone, Debug)]
pub struct EstimatorConfig {
    /// Allow the unit scan and the per-slot combination to run on the rayon pool.
    pub parallel: bool,

    /// Samples with fewer units are always scanned sequentially.
    pub parallel_min_units: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_min_units: 100_000,
        }
    }
}

impl EstimatorConfig {
    /// Configuration that never uses the thread pool.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub(crate) fn use_parallel(&self, n_units: usize) -> bool {
        self.parallel && n_units >= self.parallel_min_units
    }
}

// =============================================================================
// PotentialOutcomes
// =============================================================================

/// Estimated mean potential outcome per treatment slot.
#[derive(Clone, Debug)]
pub struct PotentialOutcomes {
    /// One value per estimand slot; NaN where the mean is undefined.
    pub means: Array1<f64>,
    /// Number of matched units counting toward the weighting.
    pub total_weight: u64,
    /// Number of groups the sample was scanned with.
    pub n_groups: usize,
}

impl PotentialOutcomes {
    /// Mean for slot `treatment`, or `None` if it is undefined or out of range.
    pub fn get(&self, treatment: usize) -> Option<f64> {
        self.means
            .get(treatment)
            .copied()
            .filter(|mean| !mean.is_nan())
    }

    pub fn n_treatments(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_infers_group_count_from_valid_ids() {
        let outcomes = array![1.0, 2.0, 3.0, 4.0];
        let groups = array![0, MISSING_GROUP, 4, 2];
        let treatments = array![0, 1, 0, 1];

        let sample =
            MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), None).unwrap();
        assert_eq!(sample.n_groups(), 5);
        assert_eq!(sample.n_units(), 4);
        assert_eq!(sample.n_unmatched(), 1);
    }

    #[test]
    fn test_explicit_group_count_wins() {
        let outcomes = array![1.0, 2.0];
        let groups = array![0, 1];
        let treatments = array![0, 1];

        let sample =
            MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), Some(10))
                .unwrap();
        assert_eq!(sample.n_groups(), 10);
    }

    #[test]
    fn test_zero_groups_is_empty_matching() {
        let outcomes = array![1.0, 2.0];
        let groups = array![0, 1];
        let treatments = array![0, 1];

        let err = MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), Some(0))
            .unwrap_err();
        assert_eq!(err, PotentialOutcomesError::EmptyMatching);

        // Nothing matched, nothing to infer from.
        let groups = array![MISSING_GROUP, MISSING_GROUP];
        let err = MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), None)
            .unwrap_err();
        assert_eq!(err, PotentialOutcomesError::EmptyMatching);
    }

    #[test]
    fn test_length_mismatch() {
        let outcomes = array![1.0, 2.0, 3.0];
        let groups = array![0, 1];
        let treatments = array![0, 1, 0];

        let err = MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), None)
            .unwrap_err();
        assert_eq!(
            err,
            PotentialOutcomesError::LengthMismatch {
                name: "matching",
                reference: "outcomes",
                expected: 3,
                actual: 2,
            }
        );

        let groups = array![0, 1, 1];
        let treatments = array![0, 1, 0, 1];
        let err = MatchedSample::new(outcomes.view(), groups.view(), treatments.view(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            PotentialOutcomesError::LengthMismatch {
                name: "treatments",
                ..
            }
        ));
    }

    #[test]
    fn test_custom_sentinel() {
        let outcomes = array![1.0, 2.0, 3.0];
        let groups = array![0, i64::MIN, 1];
        let treatments = array![0, 1, 0];

        let sample = MatchedSample::with_missing_sentinel(
            outcomes.view(),
            groups.view(),
            treatments.view(),
            None,
            i64::MIN,
        )
        .unwrap();
        assert_eq!(sample.n_groups(), 2);
        assert_eq!(sample.n_unmatched(), 1);
        assert!(sample.is_missing(i64::MIN));
        assert!(!sample.is_missing(MISSING_GROUP));
    }

    #[test]
    fn test_filters_combine_with_or() {
        let units = array![true, false, false];
        let treatments = array![false, true];

        let none = SubsetFilter::none();
        assert!(none.is_ate());
        assert!(none.includes(1, 0));

        let by_unit = SubsetFilter::units(units.view());
        assert!(by_unit.includes(0, 0));
        assert!(!by_unit.includes(1, 1));

        let by_treatment = SubsetFilter::treatments(treatments.view());
        assert!(!by_treatment.includes(0, 0));
        assert!(by_treatment.includes(2, 1));

        let both = SubsetFilter::both(units.view(), treatments.view());
        assert!(!both.is_ate());
        assert!(both.includes(0, 0));
        assert!(both.includes(1, 1));
        assert!(!both.includes(2, 0));
    }

    #[test]
    fn test_filter_lengths_are_validated() {
        let units = array![true, false];
        let treatments = array![true];

        let filter = SubsetFilter::both(units.view(), treatments.view());
        assert!(filter.validate(2, 1).is_ok());
        assert!(matches!(
            filter.validate(3, 1),
            Err(PotentialOutcomesError::LengthMismatch {
                name: "subset_indicators",
                ..
            })
        ));
        assert!(matches!(
            filter.validate(2, 2),
            Err(PotentialOutcomesError::LengthMismatch {
                name: "subset_treatments",
                ..
            })
        ));
    }

    #[test]
    fn test_get_hides_undefined_slots() {
        let result = PotentialOutcomes {
            means: array![1.5, f64::NAN],
            total_weight: 2,
            n_groups: 1,
        };
        assert_eq!(result.get(0), Some(1.5));
        assert_eq!(result.get(1), None);
        assert_eq!(result.get(2), None);
        assert_eq!(result.n_treatments(), 2);
    }
}
