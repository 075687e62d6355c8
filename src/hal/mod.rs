//! Hardware abstraction layer for the external collaborators of the control
//! core: the state estimator, the multicopter attitude and position
//! controllers and the lift motor output stage.
//!
//! The core only ever talks to these through the narrow interfaces below; it
//! never owns their internals. All angles are in degrees, positions in meters
//! (NEU, z up), velocities in m/s (NED, z down unless stated otherwise).

use nalgebra::{Vector2, Vector3};

#[cfg(test)]
pub(crate) mod doubles;

/// Commanded rotor readiness level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DesiredSpoolState {
    ShutDown,
    GroundIdle,
    ThrottleUnlimited,
}

/// Attitude and velocity estimation.
pub trait Ahrs {
    /// Estimated airspeed in m/s, `None` when no healthy estimate exists.
    fn airspeed_estimate(&self) -> Option<f32>;

    /// Ground velocity in the NE plane (m/s).
    fn groundspeed_vector(&self) -> Vector2<f32>;

    fn groundspeed(&self) -> f32 {
        self.groundspeed_vector().norm()
    }

    /// NED velocity estimate (m/s), `None` when the estimator is unhealthy.
    fn velocity_ned(&self) -> Option<Vector3<f32>>;

    /// Position relative to the EKF origin in meters, z up.
    fn position_neu_m(&self) -> Vector3<f32>;

    fn roll_deg(&self) -> f32;
    fn pitch_deg(&self) -> f32;
    fn yaw_deg(&self) -> f32;

    /// Height above the local terrain or landing point in meters.
    fn height_above_ground_m(&self) -> f32;

    /// Wind estimate in the NE plane (m/s).
    fn wind_estimate_ne(&self) -> Vector2<f32>;

    /// Equivalent to true airspeed scale factor.
    fn eas2tas(&self) -> f32 {
        1.0
    }

    /// Earth frame acceleration in m/s/s, NED, gravity included.
    fn accel_ef_mss(&self) -> Vector3<f32>;

    /// Timestamp of the last north/east position reset (GPS glitch), in ms.
    fn last_position_reset_ms(&self) -> u32;

    /// Hint that ground effect is expected imminently (touchdown).
    fn set_touchdown_expected(&mut self, expected: bool);

    /// Hint that ground effect is expected imminently (takeoff).
    fn set_takeoff_expected(&mut self, expected: bool);
}

/// Multicopter attitude controller input.
pub trait AttitudeControl {
    /// Command roll/pitch angles with a yaw rate in deg/s.
    fn input_euler_angle_yaw_rate(&mut self, roll_deg: f32, pitch_deg: f32, yaw_rate_dps: f32);

    /// Command roll/pitch angles with an absolute yaw angle.
    fn input_euler_angle_yaw_angle(&mut self, roll_deg: f32, pitch_deg: f32, yaw_deg: f32);

    /// Direct throttle output in [0, 1], bypassing the vertical position
    /// controller.
    fn set_throttle_out(&mut self, throttle: f32);

    /// Attitude-vs-throttle authority weighting.
    fn set_throttle_mix_min(&mut self);
    fn set_throttle_mix_man(&mut self);
    fn set_throttle_mix_max(&mut self, value: f32);
    fn set_throttle_mix_value(&mut self, value: f32);
    fn is_throttle_mix_min(&self) -> bool;

    /// Snap the yaw target to the current heading. When `reset_rate` is false
    /// the rate target is left undisturbed.
    fn reset_yaw_target_and_rate(&mut self, reset_rate: bool);

    /// Reset the fixed wing rate integrators while rotors dominate.
    fn reset_fw_rate_integrators(&mut self);

    /// Current attitude target in degrees.
    fn attitude_target_euler_deg(&self) -> Vector3<f32>;

    /// Magnitude of the angle between target and measured attitude in degrees.
    fn attitude_error_deg(&self) -> f32;
}

/// Multicopter position controller input, split into the NE plane and the
/// vertical (U) axis.
pub trait PositionControl {
    fn input_pos_vel_accel_ne(
        &mut self,
        pos_ne_m: Vector2<f32>,
        vel_ne_ms: Vector2<f32>,
        accel_ne_mss: Vector2<f32>,
    );

    fn input_vel_accel_ne(&mut self, vel_ne_ms: Vector2<f32>, accel_ne_mss: Vector2<f32>);

    /// Decay NE velocity targets toward zero without position tracking.
    fn relax_velocity_controller_ne(&mut self);

    fn init_ne_controller(&mut self);
    fn is_active_ne(&self) -> bool;
    fn update_ne_controller(&mut self);

    /// True when the forward pitch demand is saturated against its limit.
    fn fwd_pitch_limited(&self) -> bool;

    /// Tell the controller its output was clipped outside of it, so
    /// integrators do not wind up.
    fn set_externally_limited_ne(&mut self);

    /// Override the desired acceleration used for input shaping.
    fn set_accel_desired_ne(&mut self, accel_ne_mss: Vector2<f32>);

    fn set_max_speed_accel_ne(&mut self, speed_ms: f32, accel_mss: f32);

    /// Maximum lean angle in degrees, `None` restores the configured default.
    fn set_lean_angle_max_deg(&mut self, angle_deg: Option<f32>);

    /// Roll/pitch demands computed by the NE controller.
    fn roll_deg(&self) -> f32;
    fn pitch_deg(&self) -> f32;

    /// Desired velocity in NEU m/s (z up).
    fn desired_velocity_neu_ms(&self) -> Vector3<f32>;

    fn input_pos_u_m(&mut self, pos_u_m: f32);
    fn input_climb_rate_ms(&mut self, climb_rate_ms: f32);

    /// Descend at the given rate with landing specific shaping.
    fn land_at_climb_rate_ms(&mut self, climb_rate_ms: f32, ignore_descent_limit: bool);

    /// Relax the vertical controller toward the given throttle.
    fn relax_u_controller(&mut self, throttle: f32);

    fn init_u_controller(&mut self);
    fn update_u_controller(&mut self);

    /// Zero the vertical acceleration integrator (airbrake entry).
    fn reset_vertical_accel_integrator(&mut self);

    /// Vertical speed and acceleration limits. `speed_down_ms` is the
    /// descent limit and must be passed negative (or zero).
    fn set_max_speed_accel_u(&mut self, speed_down_ms: f32, speed_up_ms: f32, accel_mss: f32);
}

/// Lift motor output stage.
pub trait Motors {
    fn armed(&self) -> bool;

    fn set_desired_spool_state(&mut self, state: DesiredSpoolState);
    fn desired_spool_state(&self) -> DesiredSpoolState;

    /// Current total lift throttle in [0, 1].
    fn throttle(&self) -> f32;

    /// Estimated hover throttle in [0, 1].
    fn throttle_hover(&self) -> f32;

    /// True when output is pinned at the lower throttle limit.
    fn limit_throttle_lower(&self) -> bool;

    /// Zero roll/pitch/yaw/throttle demands (used before shutdown so the
    /// output does not ramp down slowly).
    fn zero_demands(&mut self);
}
