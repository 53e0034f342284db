//! Per-tick records shared by the clock, engine and exporters.

use std::fmt;

use chrono::DateTime;
use chrono_tz::Tz;

/// Clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClockMode::Running => "running",
            ClockMode::Paused => "paused",
            ClockMode::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// What the clock reports on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    /// Simulated local time.
    pub timestamp: DateTime<Tz>,
    /// Simulated time since the window start (s).
    pub elapsed_s: f64,
    /// Interpolated global horizontal irradiance (W/m²).
    pub ghi: f64,
    /// Interpolated ambient temperature (°C).
    pub temp_air: f64,
    /// Irradiance mapped onto 0..=255 for display.
    pub intensity: u8,
    /// Mode after this tick.
    pub mode: ClockMode,
    /// Set once the timestamp has clamped to the window end.
    pub end_reached: bool,
}

/// Complete record of one engine tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    /// Tick index, counted from the first tick of the run.
    pub tick: usize,
    /// Simulated local time.
    pub timestamp: DateTime<Tz>,
    /// Simulated time since the window start (s).
    pub elapsed_s: f64,
    /// Irradiance (W/m²).
    pub ghi: f64,
    /// Ambient temperature (°C).
    pub temp_air: f64,
    /// Display intensity (0..=255).
    pub intensity: u8,
    /// Operating voltage this tick (V).
    pub voltage: f64,
    /// Array current at `voltage` (A).
    pub current: f64,
    /// Delivered power, `voltage * current` (W).
    pub power: f64,
    /// Power at the true maximum power point (W).
    pub mpp_power: f64,
    /// Voltage reference chosen by the tracker for the next tick (V).
    pub next_reference: f64,
    /// Whether the clock has reached the end of its window.
    pub end_reached: bool,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>5} {} | ghi={:>6.1} W/m²  temp={:>5.1} °C | \
             V={:>6.2} V  I={:>6.3} A  P={:>7.1} W (mpp {:>7.1} W) | next V={:.2}{}",
            self.tick,
            self.timestamp.format("%m-%d %H:%M"),
            self.ghi,
            self.temp_air,
            self.voltage,
            self.current,
            self.power,
            self.mpp_power,
            self.next_reference,
            if self.end_reached { " [end]" } else { "" },
        )
    }
}
