//! Simulation engine that chains clock, circuit model and tracker.

use std::time::Instant;

use tracing::{debug, info};

use crate::circuit::{CircuitModel, DiodeSolver, NewtonSolver, OperatingPoint};
use crate::error::SimError;
use crate::weather::WeatherSeries;

use super::clock::VirtualClock;
use super::controller::MpptController;
use super::types::{ClockMode, StepResult};

/// One array's sequential pipeline: clock tick, circuit evaluation, MPPT step.
///
/// Generic over `S: DiodeSolver` for static dispatch.
#[derive(Debug, Clone)]
pub struct Engine<S: DiodeSolver = NewtonSolver> {
    clock: VirtualClock,
    model: CircuitModel<S>,
    tracker: MpptController,
    ticks: usize,
}

impl<S: DiodeSolver> Engine<S> {
    /// Creates an engine from its three collaborators.
    ///
    /// # Arguments
    ///
    /// * `clock` - Armed virtual clock
    /// * `model` - Module constants, array layout and solver
    /// * `tracker` - Voltage-reference controller
    pub fn new(clock: VirtualClock, model: CircuitModel<S>, tracker: MpptController) -> Self {
        Self {
            clock,
            model,
            tracker,
            ticks: 0,
        }
    }

    /// Executes one tick at wall-clock instant `now`.
    ///
    /// The array is evaluated at the tracker's current reference, then the
    /// tracker is fed that sample to pick the next reference.
    ///
    /// # Errors
    ///
    /// Propagates `NoWeatherLoaded` and `OutOfRange` from the clock.
    pub fn step(&mut self, now: Instant) -> Result<StepResult, SimError> {
        let reading = self.clock.tick(now)?;

        let params = self.model.parameters(reading.ghi, reading.temp_air);
        let voltage = self.tracker.reference();
        let current = self.model.current_at_voltage(&params, voltage);
        let mpp = self.model.max_power_point(&params);
        let next_reference = self.tracker.step(OperatingPoint::new(voltage, current));

        let result = StepResult {
            tick: self.ticks,
            timestamp: reading.timestamp,
            elapsed_s: reading.elapsed_s,
            ghi: reading.ghi,
            temp_air: reading.temp_air,
            intensity: reading.intensity,
            voltage,
            current,
            power: voltage * current,
            mpp_power: mpp.power(),
            next_reference,
            end_reached: reading.end_reached,
        };
        self.ticks += 1;
        Ok(result)
    }

    /// # Errors
    ///
    /// Returns `NoWeatherLoaded` if the clock was stopped.
    pub fn play(&mut self) -> Result<(), SimError> {
        self.clock.play()?;
        info!(speed = self.clock.speed(), "simulation running");
        Ok(())
    }

    pub fn pause(&mut self) {
        self.clock.pause();
        info!("simulation paused");
    }

    pub fn stop(&mut self) {
        self.clock.stop();
        info!(ticks = self.ticks, "simulation stopped");
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a non-positive speed.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SimError> {
        self.clock.set_speed(speed)?;
        debug!(speed, "speed changed");
        Ok(())
    }

    /// Loads a new slice into the clock. The tracker keeps its state.
    pub fn rearm(&mut self, series: WeatherSeries) {
        self.clock.rearm(series);
    }

    pub fn mode(&self) -> ClockMode {
        self.clock.mode()
    }

    pub fn finished(&self) -> bool {
        self.clock.end_reached()
    }

    /// Number of ticks executed so far.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn model(&self) -> &CircuitModel<S> {
        &self.model
    }

    pub fn tracker(&self) -> &MpptController {
        &self.tracker
    }
}

/// Driver-owned handle: either nothing is loaded or one engine is active.
#[derive(Debug, Default)]
pub enum Session {
    #[default]
    Idle,
    Active(Box<Engine>),
}

impl Session {
    /// Replaces any running engine with `engine`.
    pub fn start(&mut self, engine: Engine) {
        *self = Session::Active(Box::new(engine));
    }

    /// Stops and drops the active engine, returning to idle.
    pub fn end(&mut self) {
        if let Session::Active(engine) = self {
            engine.stop();
        }
        *self = Session::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Session::Active(_))
    }

    pub fn engine(&self) -> Option<&Engine> {
        match self {
            Session::Active(engine) => Some(&**engine),
            Session::Idle => None,
        }
    }

    pub fn engine_mut(&mut self) -> Option<&mut Engine> {
        match self {
            Session::Active(engine) => Some(&mut **engine),
            Session::Idle => None,
        }
    }

    /// Ticks the active engine.
    ///
    /// # Errors
    ///
    /// Returns `NoWeatherLoaded` when idle, otherwise whatever the engine returns.
    pub fn step(&mut self, now: Instant) -> Result<StepResult, SimError> {
        match self {
            Session::Active(engine) => engine.step(now),
            Session::Idle => Err(SimError::NoWeatherLoaded),
        }
    }
}
