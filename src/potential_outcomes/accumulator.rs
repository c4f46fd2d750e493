//! Per-group accumulators for the matched-group weighting.
//!
//! # Layout
//!
//! Counters live in flat arenas indexed by dense group ids:
//!
//! ```text
//! weight_count:          [g0, g1, ..., g(G-1)]
//! treatment_count:       [t0_g0, ..., t0_g(G-1), t1_g0, ..., t(T-1)_g(G-1)]
//! treatment_outcome_sum: same layout as treatment_count
//! ```
//!
//! Slot `(t, g)` sits at `t * G + g`, so each treatment's groups are one
//! contiguous slice during the combination pass.

use log::debug;
use rayon::prelude::*;

use super::types::{MatchedSample, SubsetFilter};
use crate::error::PotentialOutcomesError;

/// Zero-filled buffer allocated without aborting on failure.
fn zeroed<T: Clone + Default>(
    len: usize,
    out_of_memory: &PotentialOutcomesError,
) -> Result<Vec<T>, PotentialOutcomesError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| out_of_memory.clone())?;
    buf.resize(len, T::default());
    Ok(buf)
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GroupAccumulator {
    n_groups: usize,
    n_treatments: usize,
    /// Units per group counting toward the weighting.
    weight_count: Vec<u32>,
    /// Units per (treatment, group).
    treatment_count: Vec<u32>,
    /// Outcome sum per (treatment, group).
    treatment_outcome_sum: Vec<f64>,
}

impl GroupAccumulator {
    /// Allocate zeroed arenas for `n_groups` groups and `n_treatments` slots.
    ///
    /// Sizes that overflow or cannot be allocated are reported as
    /// [`PotentialOutcomesError::OutOfMemory`].
    pub(crate) fn new(
        n_groups: usize,
        n_treatments: usize,
    ) -> Result<Self, PotentialOutcomesError> {
        let out_of_memory = PotentialOutcomesError::OutOfMemory {
            n_groups,
            n_treatments,
        };
        let n_slots = n_groups
            .checked_mul(n_treatments)
            .ok_or_else(|| out_of_memory.clone())?;

        Ok(Self {
            n_groups,
            n_treatments,
            weight_count: zeroed(n_groups, &out_of_memory)?,
            treatment_count: zeroed(n_slots, &out_of_memory)?,
            treatment_outcome_sum: zeroed(n_slots, &out_of_memory)?,
        })
    }

    /// Single sequential pass over all units.
    pub(crate) fn scan(
        sample: &MatchedSample,
        subset: &SubsetFilter,
        n_treatments: usize,
    ) -> Result<Self, PotentialOutcomesError> {
        let mut acc = Self::new(sample.n_groups, n_treatments)?;
        for unit in 0..sample.n_units() {
            acc.record(unit, sample, subset)?;
        }
        Ok(acc)
    }

    /// Parallel pass: each rayon job folds units into its own accumulator,
    /// then the partial accumulators are summed.
    ///
    /// Job accumulators are allocated on the first unit a job sees, so an
    /// allocation failure surfaces as an error like any other.
    pub(crate) fn scan_par(
        sample: &MatchedSample,
        subset: &SubsetFilter,
        n_treatments: usize,
    ) -> Result<Self, PotentialOutcomesError> {
        let n_groups = sample.n_groups;
        let partial = (0..sample.n_units())
            .into_par_iter()
            .try_fold(
                || None,
                |acc: Option<Self>, unit| -> Result<Option<Self>, PotentialOutcomesError> {
                    let mut acc = match acc {
                        Some(acc) => acc,
                        None => Self::new(n_groups, n_treatments)?,
                    };
                    acc.record(unit, sample, subset)?;
                    Ok(Some(acc))
                },
            )
            .try_reduce(
                || None,
                |a, b| {
                    Ok(match (a, b) {
                        (Some(a), Some(b)) => Some(a.merge(b)),
                        (a, b) => a.or(b),
                    })
                },
            )?;

        match partial {
            Some(acc) => Ok(acc),
            None => Self::new(n_groups, n_treatments),
        }
    }

    /// Add one unit. Unmatched units are skipped before any bounds check.
    #[inline]
    fn record(
        &mut self,
        unit: usize,
        sample: &MatchedSample,
        subset: &SubsetFilter,
    ) -> Result<(), PotentialOutcomesError> {
        let group = sample.groups[unit];
        if sample.is_missing(group) {
            return Ok(());
        }

        let g = usize::try_from(group)
            .ok()
            .filter(|&g| g < self.n_groups)
            .ok_or(PotentialOutcomesError::MatchingOutOfBounds {
                unit,
                group,
                n_groups: self.n_groups,
            })?;

        let treatment = sample.treatments[unit];
        let t = usize::try_from(treatment)
            .ok()
            .filter(|&t| t < self.n_treatments)
            .ok_or(PotentialOutcomesError::TreatmentOutOfBounds {
                unit,
                treatment,
                n_treatments: self.n_treatments,
            })?;

        self.weight_count[g] += u32::from(subset.includes(unit, t));

        let slot = t * self.n_groups + g;
        self.treatment_count[slot] += 1;
        self.treatment_outcome_sum[slot] += sample.outcomes[unit];
        Ok(())
    }

    fn merge(mut self, other: Self) -> Self {
        debug_assert_eq!(self.n_groups, other.n_groups);
        debug_assert_eq!(self.n_treatments, other.n_treatments);

        self.weight_count
            .iter_mut()
            .zip(other.weight_count)
            .for_each(|(a, b)| *a += b);
        self.treatment_count
            .iter_mut()
            .zip(other.treatment_count)
            .for_each(|(a, b)| *a += b);
        self.treatment_outcome_sum
            .iter_mut()
            .zip(other.treatment_outcome_sum)
            .for_each(|(a, b)| *a += b);
        self
    }

    /// Sum of the weight counts, widened to avoid overflow.
    pub(crate) fn total_weight(&self) -> u64 {
        self.weight_count.iter().map(|&w| u64::from(w)).sum()
    }

    /// Weighted mean of the per-group means of treatment `t`.
    ///
    /// Returns NaN as soon as a weighted group has no unit under `t`; the
    /// remaining groups are not visited.
    pub(crate) fn weighted_mean(&self, t: usize, total_weight: u64) -> f64 {
        if total_weight == 0 {
            return f64::NAN;
        }

        let start = t * self.n_groups;
        let end = start + self.n_groups;
        let counts = &self.treatment_count[start..end];
        let sums = &self.treatment_outcome_sum[start..end];

        let mut acc = 0.0;
        for (g, ((&weight, &count), &sum)) in self
            .weight_count
            .iter()
            .zip(counts)
            .zip(sums)
            .enumerate()
        {
            if weight == 0 {
                continue;
            }
            if count == 0 {
                debug!("treatment {t} not observed in weighted group {g}, mean is undefined");
                return f64::NAN;
            }
            acc += f64::from(weight) * sum / f64::from(count);
        }
        acc / total_weight as f64
    }
}
