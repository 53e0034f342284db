//! Incremental-conductance maximum power point tracker.

use crate::circuit::OperatingPoint;
use crate::error::SimError;

/// Default voltage step (V).
pub const DEFAULT_STEP_V: f64 = 0.5;

/// Stateful incremental-conductance controller.
///
/// Each call to [`MpptController::step`] compares the new sample with the
/// previous one and nudges the voltage reference by one fixed step. At the
/// maximum power point `dI/dV = -I/V`, so the sign of `I + V·dI/dV` says which
/// side of the knee the array is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MpptController {
    previous: Option<OperatingPoint>,
    reference: f64,
    step: f64,
}

impl Default for MpptController {
    fn default() -> Self {
        Self {
            previous: None,
            reference: 0.0,
            step: DEFAULT_STEP_V,
        }
    }
}

impl MpptController {
    /// A controller with no previous sample and a zero reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `step` is not a positive finite number.
    pub fn new(step: f64) -> Result<Self, SimError> {
        validate_step(step)?;
        Ok(Self {
            step,
            ..Self::default()
        })
    }

    /// A controller seeded with a previous sample; the reference starts at
    /// its voltage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `step` is not a positive finite number.
    pub fn with_initial(initial: OperatingPoint, step: f64) -> Result<Self, SimError> {
        validate_step(step)?;
        Ok(Self {
            previous: Some(initial),
            reference: initial.voltage.max(0.0),
            step,
        })
    }

    /// Current voltage reference (V).
    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn step_size(&self) -> f64 {
        self.step
    }

    pub fn previous(&self) -> Option<OperatingPoint> {
        self.previous
    }

    /// Feeds one measured sample and returns the updated reference.
    ///
    /// Without a previous sample the call only records it.
    pub fn step(&mut self, sample: OperatingPoint) -> f64 {
        let Some(prev) = self.previous.replace(sample) else {
            return self.reference;
        };
        let (v, i) = (sample.voltage, sample.current);
        let dv = v - prev.voltage;
        let di = i - prev.current;

        if dv == 0.0 {
            if di > 0.0 {
                self.reference += self.step;
            } else if di < 0.0 {
                self.reference -= self.step;
            }
        } else {
            let l = i + v * di / dv;
            if l > 0.0 {
                if dv * di > 0.0 {
                    if dv > 0.0 {
                        self.reference += self.step;
                    } else {
                        self.reference -= self.step;
                    }
                } else {
                    self.reference += self.step;
                }
            } else if l < 0.0 {
                self.reference -= self.step;
            }
        }

        self.reference = self.reference.max(0.0);
        self.reference
    }
}

fn validate_step(step: f64) -> Result<(), SimError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SimError::invalid("mppt.step_v", "must be > 0"));
    }
    Ok(())
}
