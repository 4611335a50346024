//! Weighted floor sampling and delay distributions
//!
//! `ProbabilityModel` drives trip generation; `DelayDistribution` drives the
//! passenger decision delay and the gap between generated arrivals.

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use std::cmp::Ordering;
use std::time::Duration;

use super::error::{SimError, SimResult};
use super::types::FloorNumber;

#[derive(Debug, Clone, Copy, PartialEq)]
struct WeightedFloor {
    value: FloorNumber,
    /// Normalized, all weights of a model sum to 1.0
    weight: f64,
}

/// Weighted discrete sampler over floor numbers.
///
/// Weights are normalized once at construction, so callers may supply any
/// non-negative scale. The model is immutable afterwards and keeps no state
/// between draws; the caller owns the RNG.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    entries: Vec<WeightedFloor>,
}

impl ProbabilityModel {
    /// Build a model from `(value, weight)` pairs, in draw order.
    pub fn new<I>(weights: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (FloorNumber, f64)>,
    {
        let raw: Vec<(FloorNumber, f64)> = weights.into_iter().collect();
        if raw.is_empty() {
            return Err(SimError::InvalidDistribution("no values given".into()));
        }

        for (i, (value, weight)) in raw.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(SimError::InvalidDistribution(format!(
                    "weight {weight} for floor {value} must be finite and non-negative"
                )));
            }
            if raw[..i].iter().any(|(other, _)| other == value) {
                return Err(SimError::InvalidDistribution(format!(
                    "floor {value} appears more than once"
                )));
            }
        }

        let total: f64 = raw.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(SimError::InvalidDistribution("weights sum to zero".into()));
        }

        let entries = raw
            .into_iter()
            .map(|(value, weight)| WeightedFloor {
                value,
                weight: weight / total,
            })
            .collect();

        Ok(Self { entries })
    }

    /// Every floor in `[min, max]` equally likely
    pub fn uniform(min: FloorNumber, max: FloorNumber) -> SimResult<Self> {
        Self::new((min..=max).map(|floor| (floor, 1.0)))
    }

    /// Trip distribution favoring the terminal floor.
    ///
    /// The terminal floor carries half of the probability mass. Floors above
    /// it share the other half along a bump `(x - terminal) * (max + 1 - x)`
    /// that peaks mid-way up; floors below it along the mirrored bump
    /// `(terminal - x) * (x - min + 1)`. A single-floor building is all
    /// terminal.
    pub fn lobby_biased(
        min: FloorNumber,
        max: FloorNumber,
        terminal: FloorNumber,
    ) -> SimResult<Self> {
        if terminal < min || terminal > max {
            return Err(SimError::OutOfBounds {
                floor: terminal,
                min,
                max,
            });
        }

        let bump = |x: FloorNumber| -> f64 {
            match x.cmp(&terminal) {
                Ordering::Greater => f64::from(x - terminal) * f64::from(max + 1 - x),
                Ordering::Less => f64::from(terminal - x) * f64::from(x - min + 1),
                Ordering::Equal => 0.0,
            }
        };
        let bump_total: f64 = (min..=max).map(bump).sum();
        let terminal_weight = if bump_total > 0.0 { bump_total } else { 1.0 };

        Self::new((min..=max).map(|x| {
            if x == terminal {
                (x, terminal_weight)
            } else {
                (x, bump(x))
            }
        }))
    }

    /// Normalized probability of drawing `value`
    pub fn probability(&self, value: FloorNumber) -> f64 {
        self.entries
            .iter()
            .find(|e| e.value == value)
            .map_or(0.0, |e| e.weight)
    }

    /// Values that can actually be drawn (positive weight), in model order
    pub fn support(&self) -> impl Iterator<Item = FloorNumber> + '_ {
        self.entries
            .iter()
            .filter(|e| e.weight > 0.0)
            .map(|e| e.value)
    }

    pub fn support_len(&self) -> usize {
        self.support().count()
    }

    /// Draw one floor according to the weights
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> FloorNumber {
        let mut r: f64 = rng.random();
        for entry in &self.entries {
            if r < entry.weight {
                return entry.value;
            }
            r -= entry.weight;
        }
        // Rounding left `r` just above the last bucket
        self.support()
            .last()
            .unwrap_or(self.entries[0].value)
    }

    /// Draw `count` distinct floors, optionally seeding the result with
    /// `default` as the first value, rejecting duplicates until enough
    /// distinct values are collected.
    ///
    /// Fails with `ExhaustedDomain` when fewer than `count` distinct values
    /// can ever be produced.
    pub fn sample_unique<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        default: Option<FloorNumber>,
    ) -> SimResult<Vec<FloorNumber>> {
        let mut available = self.support_len();
        if let Some(value) = default {
            if self.probability(value) <= 0.0 {
                available += 1;
            }
        }
        if count > available {
            return Err(SimError::ExhaustedDomain {
                requested: count,
                available,
            });
        }

        let mut values = Vec::with_capacity(count);
        if let Some(value) = default {
            if count > 0 {
                values.push(value);
            }
        }
        while values.len() < count {
            let value = self.sample(rng);
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Ok(values)
    }
}

/// Distribution of a simulated delay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayDistribution {
    /// Always the same delay
    Fixed(Duration),
    /// Continuous uniform on `[min, max)`
    Uniform { min: Duration, max: Duration },
    /// Whole milliseconds, uniform on `[min_ms, max_ms]`
    DiscreteUniform { min_ms: u64, max_ms: u64 },
    /// Exponential with the given mean
    Exponential { mean: Duration },
    /// Absolute value of a normal draw
    NormalMagnitude { mean: Duration, std_dev: Duration },
}

impl DelayDistribution {
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            DelayDistribution::Fixed(_) => Ok(()),
            DelayDistribution::Uniform { min, max } if min > max => Err(
                SimError::InvalidDistribution(format!("uniform range {min:?}..{max:?} is empty")),
            ),
            DelayDistribution::DiscreteUniform { min_ms, max_ms } if min_ms > max_ms => {
                Err(SimError::InvalidDistribution(format!(
                    "discrete range {min_ms}..={max_ms} ms is empty"
                )))
            }
            DelayDistribution::Exponential { mean } if mean.is_zero() => Err(
                SimError::InvalidDistribution("exponential mean must be positive".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Draw a delay, rounded up to whole milliseconds
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let secs = match *self {
            DelayDistribution::Fixed(delay) => return delay,
            DelayDistribution::Uniform { min, max } => {
                if max <= min {
                    return min;
                }
                rng.random_range(min.as_secs_f64()..max.as_secs_f64())
            }
            DelayDistribution::DiscreteUniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(min_ms);
                }
                return Duration::from_millis(rng.random_range(min_ms..=max_ms));
            }
            DelayDistribution::Exponential { mean } => match Exp::new(1.0 / mean.as_secs_f64()) {
                Ok(exp) => exp.sample(rng),
                Err(_) => return mean,
            },
            DelayDistribution::NormalMagnitude { mean, std_dev } => {
                match Normal::new(mean.as_secs_f64(), std_dev.as_secs_f64()) {
                    Ok(normal) => normal.sample(rng).abs(),
                    Err(_) => return mean,
                }
            }
        };
        ceil_millis(secs)
    }
}

fn ceil_millis(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_millis((secs * 1000.0).ceil() as u64)
}
