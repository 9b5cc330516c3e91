//! Selection strategies for `assets.pick`

use flux_lang::Mulberry32;

use crate::catalog::ResolvedAsset;
use crate::AssetError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PickStrategy {
    #[default]
    Uniform,
    /// Proportional to each entry's `weight`; negative weights count as zero
    Weighted,
}

impl PickStrategy {
    pub fn from_name(name: &str) -> Result<Self, AssetError> {
        match name {
            "uniform" => Ok(Self::Uniform),
            "weighted" => Ok(Self::Weighted),
            other => Err(AssetError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Weighted => "weighted",
        }
    }
}

/// Pick one candidate, consuming exactly one draw from `rng`
pub fn pick<'a>(candidates: &[&'a ResolvedAsset], strategy: PickStrategy, rng: &mut Mulberry32) -> Option<&'a ResolvedAsset> {
    if candidates.is_empty() {
        return None;
    }

    match strategy {
        PickStrategy::Uniform => Some(candidates[rng.next_index(candidates.len())]),
        PickStrategy::Weighted => {
            let total: f64 = candidates.iter().map(|a| a.weight.max(0.0)).sum();
            if total <= 0.0 || !total.is_finite() {
                return Some(candidates[rng.next_index(candidates.len())]);
            }

            let target = rng.next_f64() * total;
            let mut cumulative = 0.0;
            for candidate in candidates {
                cumulative += candidate.weight.max(0.0);
                if target < cumulative {
                    return Some(*candidate);
                }
            }
            // Rounding can leave target just past the last boundary
            candidates.iter().rev().find(|a| a.weight > 0.0).copied()
        }
    }
}
