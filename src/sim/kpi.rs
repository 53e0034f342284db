//! Post-hoc run summary computed from step results.

use std::fmt;

use super::types::StepResult;

/// Aggregate indicators for a complete run.
///
/// Computed post-hoc from `&[StepResult]` so the summary always agrees with
/// the step data. Energy is integrated over simulated time, crediting each
/// step's power for the simulated interval since the previous step.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    /// Energy delivered at the tracked operating point (Wh).
    pub energy_wh: f64,
    /// Energy available at the true maximum power point (Wh).
    pub mpp_energy_wh: f64,
    /// `energy_wh / mpp_energy_wh` as a percentage; 0 when nothing was available.
    pub tracking_efficiency_pct: f64,
    /// Highest delivered power (W).
    pub peak_power_w: f64,
    /// Highest irradiance seen (W/m²).
    pub peak_ghi: f64,
    /// Simulated time covered (h).
    pub simulated_hours: f64,
    /// Number of ticks.
    pub tick_count: usize,
}

impl KpiReport {
    /// Computes the summary from the complete step record vector.
    ///
    /// # Arguments
    ///
    /// * `results` - Step results in tick order
    pub fn from_results(results: &[StepResult]) -> Self {
        let mut energy = 0.0_f64;
        let mut mpp_energy = 0.0_f64;
        let mut peak_power = 0.0_f64;
        let mut peak_ghi = 0.0_f64;
        let mut prev_elapsed = results.first().map_or(0.0, |r| r.elapsed_s);

        for r in results {
            let dt_h = (r.elapsed_s - prev_elapsed).max(0.0) / 3600.0;
            prev_elapsed = r.elapsed_s;
            energy += r.power * dt_h;
            mpp_energy += r.mpp_power * dt_h;
            peak_power = peak_power.max(r.power);
            peak_ghi = peak_ghi.max(r.ghi);
        }

        let simulated_hours = match (results.first(), results.last()) {
            (Some(first), Some(last)) => (last.elapsed_s - first.elapsed_s) / 3600.0,
            _ => 0.0,
        };

        let tracking_efficiency_pct = if mpp_energy > 0.0 {
            100.0 * energy / mpp_energy
        } else {
            0.0
        };

        Self {
            energy_wh: energy,
            mpp_energy_wh: mpp_energy,
            tracking_efficiency_pct,
            peak_power_w: peak_power,
            peak_ghi,
            simulated_hours,
            tick_count: results.len(),
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Energy harvested:      {:.1} Wh", self.energy_wh)?;
        writeln!(f, "Energy at MPP:         {:.1} Wh", self.mpp_energy_wh)?;
        writeln!(f, "Tracking efficiency:   {:.1}%", self.tracking_efficiency_pct)?;
        writeln!(f, "Peak power:            {:.1} W", self.peak_power_w)?;
        writeln!(f, "Peak irradiance:       {:.1} W/m²", self.peak_ghi)?;
        writeln!(f, "Simulated time:        {:.1} h", self.simulated_hours)?;
        write!(f, "Ticks:                 {}", self.tick_count)
    }
}
