//! Headless driver: builds an engine from a scenario and plays it to the end.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::circuit::{CircuitModel, OperatingPoint};
use crate::config::{ScenarioConfig, SimulationConfig};
use crate::error::SimError;
use crate::sim::clock::VirtualClock;
use crate::sim::controller::MpptController;
use crate::sim::engine::Engine;
use crate::sim::kpi::KpiReport;
use crate::sim::types::StepResult;
use crate::timezone::TimeZoneResolver;
use crate::weather::{self, WeatherSource};

pub struct SimulationResult {
    pub results: Vec<StepResult>,
    pub kpi: KpiReport,
}

/// Resolves the site, fetches weather and wires clock, model and tracker.
///
/// The tracker is seeded with `(initial_voltage, 0 A)` so its first sample
/// already has a previous point to compare against.
///
/// # Errors
///
/// Propagates `InvalidConfiguration`, `UnknownTimezone` and
/// `DataUnavailable` from the collaborators.
pub fn build_engine(
    cfg: &ScenarioConfig,
    source: &dyn WeatherSource,
    resolver: &dyn TimeZoneResolver,
) -> Result<Engine, SimError> {
    let place = cfg.site()?.resolve(resolver)?;
    info!(
        latitude = place.location.latitude,
        longitude = place.location.longitude,
        tz = %place.tz,
        "resolved site"
    );
    let series = weather::fetch(source, &place, &cfg.sim_window()?)?;

    let clock = VirtualClock::new(series, cfg.simulation.speed)?;
    let model = CircuitModel::new(cfg.module, cfg.array)?;
    let tracker = MpptController::with_initial(
        OperatingPoint::new(cfg.mppt.initial_voltage, 0.0),
        cfg.mppt.step_v,
    )?;
    Ok(Engine::new(clock, model, tracker))
}

/// Builds an engine using the scenario's own weather source and resolver.
///
/// # Errors
///
/// See [`build_engine`].
pub fn build_engine_from_config(cfg: &ScenarioConfig) -> Result<Engine, SimError> {
    let source = cfg.weather_source()?;
    let resolver = cfg.resolver();
    build_engine(cfg, source.as_ref(), resolver.as_ref())
}

/// Plays `engine` until its window ends or `max_ticks` is hit.
///
/// Ticks are spaced `tick_interval_ms` apart. Unless `realtime` is set the
/// wall clock is virtual, so a two-week window finishes in milliseconds.
/// `on_step` sees every result as it is produced.
///
/// # Errors
///
/// Propagates the first engine error.
pub fn run_to_end(
    engine: &mut Engine,
    sim: &SimulationConfig,
    mut on_step: impl FnMut(&StepResult),
) -> Result<Vec<StepResult>, SimError> {
    let interval = Duration::from_millis(sim.tick_interval_ms.max(1));
    let base = Instant::now();
    let mut results = Vec::new();

    engine.play()?;
    let mut now = base;
    loop {
        let result = engine.step(now)?;
        on_step(&result);
        let finished = result.end_reached;
        results.push(result);

        if finished || sim.max_ticks.is_some_and(|max| results.len() >= max) {
            break;
        }
        if sim.realtime {
            thread::sleep(interval);
            now = Instant::now();
        } else {
            now += interval;
        }
    }

    info!(
        ticks = results.len(),
        finished = engine.finished(),
        "run complete"
    );
    Ok(results)
}

/// Builds, plays and summarizes a scenario.
///
/// # Errors
///
/// See [`build_engine_from_config`] and [`run_to_end`].
pub fn run_scenario(
    cfg: &ScenarioConfig,
    on_step: impl FnMut(&StepResult),
) -> Result<SimulationResult, SimError> {
    let mut engine = build_engine_from_config(cfg)?;
    let results = run_to_end(&mut engine, &cfg.simulation, on_step)?;
    let kpi = KpiReport::from_results(&results);
    Ok(SimulationResult { results, kpi })
}
