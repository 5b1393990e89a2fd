//! Critically damped integrators that turn control targets into smooth motion.
//!
//! Each integrator keeps its own velocity and phase across frames. Resetting a
//! target in [`ParameterState`] does not reset momentum; only the explicit
//! `reset`/`resync` helpers do.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::params::ParameterState;

/// Gain applied to spin-style controls before they become angular velocity.
pub const SPIN_GAIN: f32 = 0.2;

/// Fraction of the remaining velocity error closed per 60 Hz tick.
pub const CONVERGENCE_RATE: f32 = 0.5;

/// How the convergence coefficient relates to frame time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Damping {
    /// Fixed coefficient each frame, tuned for ~60 Hz.
    PerTick,
    /// Exponential decay scaled by dt, equal to `PerTick` at `reference_hz`.
    #[serde(rename_all = "camelCase")]
    TimeCorrected { reference_hz: f32 },
}

impl Default for Damping {
    fn default() -> Self {
        Damping::PerTick
    }
}

impl Damping {
    /// Convergence coefficient for a frame of length `dt`.
    pub fn coefficient(self, dt: f32) -> f32 {
        match self {
            Damping::PerTick => CONVERGENCE_RATE,
            Damping::TimeCorrected { reference_hz } => {
                1.0 - (1.0 - CONVERGENCE_RATE).powf(dt * reference_hz)
            }
        }
    }
}

/// Damped angular integrator emitting a sin/cos pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Oscillator {
    pub angle: f32,
    pub velocity: f32,
}

impl Oscillator {
    /// Advance toward `SPIN_GAIN * control`. `scale` is speed times the motion factor.
    pub fn step(&mut self, control: f32, c: f32, dt: f32, scale: f32) -> (f32, f32) {
        let target = SPIN_GAIN * control;
        self.velocity += (target - self.velocity) * c;
        self.angle += self.velocity * dt * scale;
        self.angle.sin_cos()
    }

    /// Restore a phase and set velocity to the steady state for `control`.
    pub fn resync(&mut self, angle: f32, control: f32) {
        self.angle = angle;
        self.velocity = SPIN_GAIN * control;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Damped linear integrator over three axes. Phase is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drift3 {
    pub phase: Vec3,
    pub velocity: Vec3,
}

impl Drift3 {
    pub fn with_phase(phase: Vec3) -> Self {
        Self { phase, velocity: Vec3::ZERO }
    }

    pub fn step(&mut self, target: Vec3, c: f32, dt: f32, scale: f32) -> Vec3 {
        self.velocity += (target - self.velocity) * c;
        self.phase += self.velocity * dt * scale;
        self.phase
    }

    pub fn resync(&mut self, phase: Vec3, target: Vec3) {
        self.phase = phase;
        self.velocity = target;
    }
}

/// Single-axis damped drift (fog/turbulence time).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drift1 {
    pub phase: f32,
    pub velocity: f32,
}

impl Drift1 {
    pub fn step(&mut self, target: f32, c: f32, dt: f32, scale: f32) -> f32 {
        self.velocity += (target - self.velocity) * c;
        self.phase += self.velocity * dt * scale;
        self.phase
    }
}

/// Default drift offset the fractal starts from.
pub const DRIFT_ORIGIN: Vec3 = Vec3::new(0.0, 0.0, 0.1);

/// The five integrators driven once per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Integrators {
    pub spin: Oscillator,
    pub fractal_rotation: Oscillator,
    pub drift: Drift3,
    pub halving: Drift3,
    pub fog: Drift1,
}

impl Default for Integrators {
    fn default() -> Self {
        Self {
            spin: Oscillator::default(),
            fractal_rotation: Oscillator::default(),
            drift: Drift3::with_phase(DRIFT_ORIGIN),
            halving: Drift3::default(),
            fog: Drift1::default(),
        }
    }
}

fn read_vec3(params: &ParameterState, names: [&str; 3]) -> Vec3 {
    Vec3::new(params.float(names[0]), params.float(names[1]), params.float(names[2]))
}

fn write_vec3(params: &mut ParameterState, names: [&str; 3], v: Vec3) {
    params.set_float(names[0], v.x);
    params.set_float(names[1], v.y);
    params.set_float(names[2], v.z);
}

pub const DRIFT_TARGETS: [&str; 3] = ["fractal_drift_x", "fractal_drift_y", "fractal_drift_z"];
pub const DRIFT_OFFSETS: [&str; 3] =
    ["fractal_drift_offset_x", "fractal_drift_offset_y", "fractal_drift_offset_z"];
pub const HALVING_TARGETS: [&str; 3] =
    ["fractal_halving_time_x", "fractal_halving_time_y", "fractal_halving_time_z"];
pub const HALVING_PHASES: [&str; 3] =
    ["fractal_halving_phase_x", "fractal_halving_phase_y", "fractal_halving_phase_z"];

impl Integrators {
    /// Run every integrator once, in fixed order, writing results into `params`.
    ///
    /// `dt` is used as-is; a stalled frame produces one large step.
    pub fn advance(&mut self, params: &mut ParameterState, dt: f32, speed: f32, damping: Damping) {
        let c = damping.coefficient(dt);
        let s = speed * 2.0;

        let (sin, cos) = self.spin.step(params.float("spin"), c, dt, s);
        params.set_float("rot_time_sin", sin);
        params.set_float("rot_time_cos", cos);

        let (sin, cos) =
            self.fractal_rotation.step(params.float("fractal_rotation_speed"), c, dt, s);
        params.set_float("fractal_rot_time_sin", sin);
        params.set_float("fractal_rot_time_cos", cos);

        let offset = self.drift.step(read_vec3(params, DRIFT_TARGETS), c, dt, s);
        write_vec3(params, DRIFT_OFFSETS, offset);

        let phase = self.halving.step(read_vec3(params, HALVING_TARGETS), c, dt, s);
        write_vec3(params, HALVING_PHASES, phase);

        let turb_time = self.fog.step(params.float("turb_speed"), c, dt, s);
        params.set_float("turb_time", turb_time);
    }

    /// Re-seed momentum from the control values currently in `params`, keeping
    /// the phases stored there. Used after loading a preset so motion resumes.
    pub fn resync_from(&mut self, params: &ParameterState, fractal_rot_phase: f32) {
        let spin_angle = params.float("rot_time_sin").atan2(params.float("rot_time_cos"));
        self.spin.resync(spin_angle, params.float("spin"));
        self.fractal_rotation
            .resync(fractal_rot_phase, params.float("fractal_rotation_speed"));
        self.drift
            .resync(read_vec3(params, DRIFT_OFFSETS), read_vec3(params, DRIFT_TARGETS));
        self.halving
            .resync(read_vec3(params, HALVING_PHASES), read_vec3(params, HALVING_TARGETS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_oscillator_converges_to_gain_times_control() {
        let mut osc = Oscillator::default();
        let mut last_error = f32::MAX;
        for _ in 0..40 {
            osc.step(1.0, CONVERGENCE_RATE, DT, 2.0);
            let error = (SPIN_GAIN - osc.velocity).abs();
            assert!(error <= last_error);
            last_error = error;
        }
        assert!(last_error < 1e-6);
    }

    #[test]
    fn test_steady_state_is_linear() {
        let mut osc = Oscillator { angle: 0.0, velocity: SPIN_GAIN };
        osc.step(1.0, CONVERGENCE_RATE, DT, 2.0);
        let a1 = osc.angle;
        osc.step(1.0, CONVERGENCE_RATE, DT, 2.0);
        assert_eq!(osc.velocity, SPIN_GAIN);
        assert!((osc.angle - 2.0 * a1).abs() < 1e-6);
    }

    #[test]
    fn test_drift_velocity_approaches_target() {
        let mut drift = Drift3::default();
        let target = Vec3::new(1.0, -2.0, 0.5);
        for _ in 0..30 {
            drift.step(target, CONVERGENCE_RATE, DT, 2.0);
        }
        assert!((drift.velocity - target).length() < 1e-5);
    }

    #[test]
    fn test_time_corrected_matches_per_tick_at_reference_rate() {
        let tc = Damping::TimeCorrected { reference_hz: 60.0 };
        assert!((tc.coefficient(DT) - CONVERGENCE_RATE).abs() < 1e-6);
        // Two half-length frames close the same gap as one full frame.
        let half = tc.coefficient(DT / 2.0);
        let combined = 1.0 - (1.0 - half) * (1.0 - half);
        assert!((combined - CONVERGENCE_RATE).abs() < 1e-5);
        assert_eq!(Damping::PerTick.coefficient(0.5), CONVERGENCE_RATE);
    }

    #[test]
    fn test_advance_writes_uniforms() {
        let mut params = ParameterState::new();
        params.set_float("spin", 1.0);
        params.set_float("turb_speed", 0.3);
        params.set_float("fractal_halving_time_x", 1.0);
        let mut integrators = Integrators::default();
        for _ in 0..10 {
            integrators.advance(&mut params, DT, 1.0, Damping::PerTick);
        }
        let angle = integrators.spin.angle;
        assert!(angle > 0.0);
        assert_eq!(params.float("rot_time_sin"), angle.sin());
        assert_eq!(params.float("rot_time_cos"), angle.cos());
        assert!(params.float("turb_time") > 0.0);
        assert!(params.float("fractal_halving_phase_x") > 0.0);
        // Drift z keeps moving from its origin.
        assert!(params.float("fractal_drift_offset_z") > 0.1);
    }

    #[test]
    fn test_changing_target_keeps_momentum() {
        let mut params = ParameterState::new();
        params.set_float("spin", 5.0);
        let mut integrators = Integrators::default();
        integrators.advance(&mut params, DT, 1.0, Damping::PerTick);
        let v = integrators.spin.velocity;
        params.set_float("spin", 0.0);
        assert_eq!(integrators.spin.velocity, v);
        integrators.advance(&mut params, DT, 1.0, Damping::PerTick);
        assert!(integrators.spin.velocity > 0.0 && integrators.spin.velocity < v);
    }

    #[test]
    fn test_resync_from_params() {
        let mut params = ParameterState::new();
        params.set_float("spin", 2.0);
        params.set_float("rot_time_sin", 1.0);
        params.set_float("rot_time_cos", 0.0);
        params.set_float("fractal_drift_x", 0.4);
        let mut integrators = Integrators::default();
        integrators.resync_from(&params, 0.7);
        assert!((integrators.spin.angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(integrators.spin.velocity, 0.4);
        assert_eq!(integrators.fractal_rotation.angle, 0.7);
        assert_eq!(integrators.drift.velocity.x, 0.4);
        assert_eq!(integrators.drift.phase, DRIFT_ORIGIN);
    }
}
