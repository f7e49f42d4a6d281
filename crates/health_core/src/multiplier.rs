//! Factor multipliers: per-factor scaling contributed by parts, quirks and
//! conditions.
//!
//! A multiplier keeps two channels. The free channel multiplies
//! unconditionally. The bonus channel is crew-bounded: a part that halves
//! Stress for 2 crew stores a bonus sum of `(1 - 0.5) * 2 = 1`, and only when
//! the multiplier is applied is that sum divided by the actual crew count.
//! Min/max bounds track the most extreme single contribution so the
//! effective value never overshoots what any source asked for.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::FactorId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorMultiplier {
    /// `None` is the wildcard that applies to every factor.
    pub factor: Option<FactorId>,
    pub bonus_sum: f64,
    pub free_multiplier: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl FactorMultiplier {
    pub fn new(factor: Option<FactorId>) -> Self {
        Self {
            factor,
            bonus_sum: 0.0,
            free_multiplier: 1.0,
            min_multiplier: 1.0,
            max_multiplier: 1.0,
        }
    }

    /// Fold in one source. `crew_cap == 0` means the source is unconstrained.
    pub fn modify(&mut self, multiplier: f64, crew_cap: u32) {
        if crew_cap == 0 {
            self.free_multiplier *= multiplier;
        } else {
            self.bonus_sum += (1.0 - multiplier) * f64::from(crew_cap);
        }
        self.min_multiplier = self.min_multiplier.min(multiplier);
        self.max_multiplier = self.max_multiplier.max(multiplier);
    }

    /// Combine two records for the same factor. Mismatched factors are a
    /// programming error: logged, and `self` is returned unchanged.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        if self.factor != other.factor {
            tracing::error!(
                left = ?self.factor,
                right = ?other.factor,
                "combining multipliers for different factors"
            );
            return self.clone();
        }
        Self {
            factor: self.factor,
            bonus_sum: self.bonus_sum + other.bonus_sum,
            free_multiplier: self.free_multiplier * other.free_multiplier,
            min_multiplier: self.min_multiplier.min(other.min_multiplier),
            max_multiplier: self.max_multiplier.max(other.max_multiplier),
        }
    }

    /// The multiplier to apply to a factor's raw output for a crew of `crew_count`.
    pub fn effective(&self, crew_count: usize) -> f64 {
        let bonus_fraction = if crew_count == 0 {
            0.0
        } else {
            (self.bonus_sum / crew_count as f64).clamp(-1.0, 1.0)
        };
        let value = self.free_multiplier * (1.0 - bonus_fraction);
        // max/min instead of clamp: corrupt saves may carry min > max.
        value.max(self.min_multiplier).min(self.max_multiplier)
    }

    pub fn is_trivial(&self) -> bool {
        self.bonus_sum.abs() < f64::EPSILON && (self.free_multiplier - 1.0).abs() < f64::EPSILON
    }
}

/// All multipliers of one effect, at most one per factor, kept sorted with
/// the wildcard first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorMultiplierList(SmallVec<[FactorMultiplier; 2]>);

impl FactorMultiplierList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, factor: Option<FactorId>) -> Option<&FactorMultiplier> {
        self.0.iter().find(|m| m.factor == factor)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactorMultiplier> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fold one source into the record for `factor`, creating it if needed.
    pub fn modify(&mut self, factor: Option<FactorId>, multiplier: f64, crew_cap: u32) {
        self.entry(factor).modify(multiplier, crew_cap);
    }

    /// Merge a whole record in, combining with an existing one for the same factor.
    pub fn insert(&mut self, multiplier: &FactorMultiplier) {
        let entry = self.entry(multiplier.factor);
        *entry = entry.combine(multiplier);
    }

    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for multiplier in &other.0 {
            result.insert(multiplier);
        }
        result
    }

    /// Resolved multiplier for `factor`, including the wildcard.
    pub fn effective(&self, factor: FactorId, crew_count: usize) -> f64 {
        let specific = self
            .get(Some(factor))
            .map_or(1.0, |m| m.effective(crew_count));
        let wildcard = self.get(None).map_or(1.0, |m| m.effective(crew_count));
        specific * wildcard
    }

    /// Drop records that would not change anything.
    pub fn retain_nontrivial(&mut self) {
        self.0.retain(|m| !m.is_trivial());
    }

    fn entry(&mut self, factor: Option<FactorId>) -> &mut FactorMultiplier {
        let index = match self.0.iter().position(|m| m.factor == factor) {
            Some(index) => index,
            None => {
                let index = self.0.partition_point(|m| m.factor < factor);
                self.0.insert(index, FactorMultiplier::new(factor));
                index
            }
        };
        &mut self.0[index]
    }
}
