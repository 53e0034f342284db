//! Numerical solution of the implicit single-diode equation.
//!
//! ```text
//! I = IL - I0 * (exp((V + I*Rs) / nNsVth) - 1) - (V + I*Rs) / Rsh
//! ```

use tracing::warn;

use super::{CircuitParameters, OperatingPoint};

const GOLDEN: f64 = 0.618_033_988_749_894_8;

/// Summary of an I-V curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveInfo {
    /// Short-circuit current (A).
    pub i_sc: f64,
    /// Open-circuit voltage (V).
    pub v_oc: f64,
    /// Current at the maximum power point (A).
    pub i_mp: f64,
    /// Voltage at the maximum power point (V).
    pub v_mp: f64,
    /// Maximum power (W).
    pub p_mp: f64,
    /// Curve samples from 0 V to `v_oc`.
    pub points: Vec<OperatingPoint>,
}

/// Evaluates the single-diode equation.
pub trait DiodeSolver {
    /// Terminal current at `voltage`.
    fn current_at_voltage(&self, params: &CircuitParameters, voltage: f64) -> f64;

    /// Voltage at which the terminal current is zero.
    fn open_circuit_voltage(&self, params: &CircuitParameters) -> f64;

    /// Locates the maximum power point on `[0, Voc]` by golden-section search.
    fn max_power_point(&self, params: &CircuitParameters) -> OperatingPoint {
        let power = |v: f64| v * self.current_at_voltage(params, v);
        let v_oc = self.open_circuit_voltage(params);
        let (mut lo, mut hi) = (0.0, v_oc);
        let mut a = hi - GOLDEN * (hi - lo);
        let mut b = lo + GOLDEN * (hi - lo);
        let (mut pa, mut pb) = (power(a), power(b));
        while hi - lo > 1e-6 * v_oc.max(1.0) {
            if pa < pb {
                lo = a;
                a = b;
                pa = pb;
                b = lo + GOLDEN * (hi - lo);
                pb = power(b);
            } else {
                hi = b;
                b = a;
                pb = pa;
                a = hi - GOLDEN * (hi - lo);
                pa = power(a);
            }
        }
        let v = 0.5 * (lo + hi);
        OperatingPoint::new(v, self.current_at_voltage(params, v))
    }

    /// Samples `n` points (at least 2) uniformly from 0 V to `Voc`.
    fn full_curve(&self, params: &CircuitParameters, n: usize) -> CurveInfo {
        let n = n.max(2);
        let v_oc = self.open_circuit_voltage(params);
        let points = (0..n)
            .map(|k| {
                let v = v_oc * k as f64 / (n - 1) as f64;
                OperatingPoint::new(v, self.current_at_voltage(params, v))
            })
            .collect::<Vec<_>>();
        let mpp = self.max_power_point(params);
        CurveInfo {
            i_sc: points[0].current,
            v_oc,
            i_mp: mpp.current,
            v_mp: mpp.voltage,
            p_mp: mpp.power(),
            points,
        }
    }
}

/// Newton-Raphson iteration on the implicit equation.
///
/// The residual is concave and decreasing in both I and V, so starting on the
/// far side of the root (I = IL for current, the ideal-diode Voc for voltage)
/// converges monotonically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonSolver {
    /// Iteration cap.
    pub max_iter: usize,
    /// Absolute step tolerance (A or V).
    pub tol: f64,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-9,
        }
    }
}

impl DiodeSolver for NewtonSolver {
    fn current_at_voltage(&self, p: &CircuitParameters, voltage: f64) -> f64 {
        let g = p.shunt_conductance();
        let mut i = p.photocurrent;
        for _ in 0..self.max_iter {
            let vd = voltage + i * p.resistance_series;
            let e = (vd / p.n_ns_vth).exp();
            let f = p.photocurrent - p.saturation_current * (e - 1.0) - vd * g - i;
            let df = -p.saturation_current * e * p.resistance_series / p.n_ns_vth
                - p.resistance_series * g
                - 1.0;
            let step = f / df;
            i -= step;
            if step.abs() < self.tol {
                return i;
            }
        }
        warn!(
            voltage,
            current = i,
            max_iter = self.max_iter,
            "single-diode current did not converge"
        );
        i
    }

    fn open_circuit_voltage(&self, p: &CircuitParameters) -> f64 {
        let g = p.shunt_conductance();
        let mut v = p.n_ns_vth * (p.photocurrent / p.saturation_current + 1.0).ln();
        for _ in 0..self.max_iter {
            let e = (v / p.n_ns_vth).exp();
            let f = p.photocurrent - p.saturation_current * (e - 1.0) - v * g;
            let df = -p.saturation_current * e / p.n_ns_vth - g;
            let step = f / df;
            v -= step;
            if step.abs() < self.tol {
                return v;
            }
        }
        warn!(
            voltage = v,
            max_iter = self.max_iter,
            "open-circuit voltage did not converge"
        );
        v
    }
}
