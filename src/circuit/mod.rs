//! Single-diode equivalent circuit: DeSoto parameter derivation and array scaling.

use serde::{Deserialize, Serialize};

use crate::error::SimError;

pub mod solver;

pub use solver::{CurveInfo, DiodeSolver, NewtonSolver};

/// Reference cell temperature (K).
pub const T_REF_K: f64 = 298.15;
/// Reference irradiance (W/m²).
pub const S_REF: f64 = 1000.0;
/// Boltzmann constant (eV/K).
pub const BOLTZMANN_EV: f64 = 8.617332478e-5;
/// Photocurrent used when the irradiance-derived value is not positive (A).
pub const MIN_PHOTOCURRENT: f64 = 0.001;

const C_TO_K: f64 = 273.15;

/// A (voltage, current) sample on the I-V plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OperatingPoint {
    /// Volts.
    pub voltage: f64,
    /// Amperes.
    pub current: f64,
}

impl OperatingPoint {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self { voltage, current }
    }

    /// Electrical power at this point (W).
    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}

/// DeSoto reference constants for one module.
///
/// Defaults are the Canadian Solar CS5P-220M, a common example module in
/// single-diode libraries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceParams {
    /// Short-circuit current temperature coefficient (A/°C).
    pub alpha_sc: f64,
    /// Modified ideality factor at reference conditions (V).
    pub a_ref: f64,
    /// Light-generated current at reference conditions (A).
    pub i_l_ref: f64,
    /// Diode saturation current at reference conditions (A).
    pub i_o_ref: f64,
    /// Shunt resistance at reference conditions (Ω).
    pub r_sh_ref: f64,
    /// Series resistance (Ω).
    pub r_s: f64,
    /// Bandgap energy at reference temperature (eV).
    pub eg_ref: f64,
    /// Bandgap temperature dependence (1/K).
    pub degdt: f64,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            alpha_sc: 0.004539,
            a_ref: 2.6373,
            i_l_ref: 5.114,
            i_o_ref: 8.196e-10,
            r_sh_ref: 381.68,
            r_s: 1.065,
            eg_ref: 1.121,
            degdt: -0.0002677,
        }
    }
}

/// The five single-diode parameters at one operating condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitParameters {
    /// Photocurrent (A).
    pub photocurrent: f64,
    /// Diode saturation current (A).
    pub saturation_current: f64,
    /// Series resistance (Ω).
    pub resistance_series: f64,
    /// Shunt resistance (Ω); infinite at zero irradiance.
    pub resistance_shunt: f64,
    /// Product of ideality factor, cells in series and thermal voltage (V).
    pub n_ns_vth: f64,
}

impl CircuitParameters {
    /// Shunt conductance, zero when the shunt resistance is infinite.
    pub fn shunt_conductance(&self) -> f64 {
        1.0 / self.resistance_shunt
    }
}

/// Applies the DeSoto irradiance and temperature correction.
///
/// `temperature` is the cell temperature in °C. Zero or negative irradiance
/// is valid: the photocurrent is floored to [`MIN_PHOTOCURRENT`] and the shunt
/// resistance becomes infinite.
pub fn derive_parameters(
    irradiance: f64,
    temperature: f64,
    device: &DeviceParams,
) -> CircuitParameters {
    let tc = temperature + C_TO_K;
    let eg = device.eg_ref * (1.0 + device.degdt * (tc - T_REF_K));
    let n_ns_vth = device.a_ref * tc / T_REF_K;

    let mut photocurrent = irradiance / S_REF * (device.i_l_ref + device.alpha_sc * (tc - T_REF_K));
    if irradiance <= 0.0 || photocurrent <= 0.0 {
        photocurrent = MIN_PHOTOCURRENT;
    }

    let saturation_current = device.i_o_ref
        * (tc / T_REF_K).powi(3)
        * (device.eg_ref / (BOLTZMANN_EV * T_REF_K) - eg / (BOLTZMANN_EV * tc)).exp();

    let resistance_shunt = if irradiance > 0.0 {
        device.r_sh_ref * S_REF / irradiance
    } else {
        f64::INFINITY
    };

    CircuitParameters {
        photocurrent,
        saturation_current,
        resistance_series: device.r_s,
        resistance_shunt,
        n_ns_vth,
    }
}

/// Modules wired `series` deep and `parallel` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArrayLayout {
    pub series: u32,
    pub parallel: u32,
}

impl Default for ArrayLayout {
    fn default() -> Self {
        Self {
            series: 1,
            parallel: 1,
        }
    }
}

impl ArrayLayout {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if either count is zero.
    pub fn new(series: u32, parallel: u32) -> Result<Self, SimError> {
        let layout = Self { series, parallel };
        layout.validate()?;
        Ok(layout)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if either count is zero.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.series == 0 {
            return Err(SimError::invalid("array.series", "must be at least 1"));
        }
        if self.parallel == 0 {
            return Err(SimError::invalid("array.parallel", "must be at least 1"));
        }
        Ok(())
    }

    /// Scales module parameters to one equivalent diode for the whole array.
    pub fn scale(&self, module: &CircuitParameters) -> CircuitParameters {
        let ns = f64::from(self.series);
        let np = f64::from(self.parallel);
        CircuitParameters {
            photocurrent: module.photocurrent * np,
            saturation_current: module.saturation_current * np,
            resistance_series: module.resistance_series * ns / np,
            resistance_shunt: module.resistance_shunt * ns / np,
            n_ns_vth: module.n_ns_vth * ns,
        }
    }
}

/// Module constants, array wiring and a solver bundled for per-tick use.
///
/// Generic over `S: DiodeSolver` for static dispatch.
#[derive(Debug, Clone)]
pub struct CircuitModel<S: DiodeSolver = NewtonSolver> {
    device: DeviceParams,
    layout: ArrayLayout,
    solver: S,
}

impl CircuitModel<NewtonSolver> {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the layout has a zero count.
    pub fn new(device: DeviceParams, layout: ArrayLayout) -> Result<Self, SimError> {
        Self::with_solver(device, layout, NewtonSolver::default())
    }
}

impl<S: DiodeSolver> CircuitModel<S> {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the layout has a zero count.
    pub fn with_solver(
        device: DeviceParams,
        layout: ArrayLayout,
        solver: S,
    ) -> Result<Self, SimError> {
        layout.validate()?;
        Ok(Self {
            device,
            layout,
            solver,
        })
    }

    pub fn device(&self) -> &DeviceParams {
        &self.device
    }

    pub fn layout(&self) -> ArrayLayout {
        self.layout
    }

    /// Array-level parameters at the given irradiance (W/m²) and temperature (°C).
    pub fn parameters(&self, irradiance: f64, temperature: f64) -> CircuitParameters {
        self.layout
            .scale(&derive_parameters(irradiance, temperature, &self.device))
    }

    pub fn current_at_voltage(&self, params: &CircuitParameters, voltage: f64) -> f64 {
        self.solver.current_at_voltage(params, voltage)
    }

    /// `n` points spaced uniformly from 0 V to open circuit.
    pub fn full_curve(&self, params: &CircuitParameters, n: usize) -> CurveInfo {
        self.solver.full_curve(params, n)
    }

    pub fn max_power_point(&self, params: &CircuitParameters) -> OperatingPoint {
        self.solver.max_power_point(params)
    }
}
