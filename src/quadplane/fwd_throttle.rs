//! Blending of authority between the rotors and the forward propulsion.
//!
//! Two alternative forward throttle schemes: a tilt derived mapping
//! (`fwd_thr_gain`) that converts demanded nose down pitch into forward
//! throttle, and the older velocity error integrator (`vel_forward_gain`).
//! Also owns the rotor throttle-vs-attitude mix policy.

use crate::assist::AssistDecision;
use crate::filter::{LowPassFilter, LowPassFilterVector3};
use crate::hal::{Ahrs, AttitudeControl, Motors, PositionControl};
use crate::quadplane::{QuadPlane, TickInput};
use crate::telemetry::TelemetrySink;
use crate::transition::TransitionStrategy;
use crate::{constrain_float, linear_interpolate, sq, GRAVITY_MSS};
use nalgebra::{Vector2, Vector3};
use num_traits::Float;

/// fraction of the pitch limit range slewed per second
const FWD_PITCH_LIMIT_SLEW: f32 = 0.1;
/// time constant for the back transition pitch up cap
const BACK_PITCH_TCONST_S: f32 = 0.5;
/// the forward velocity integrator runs at 10 Hz
const VEL_FORWARD_PERIOD_MS: u32 = 100;

/// State of the rotor/forward blending.
pub struct ThrottleBlendState {
    /// forward throttle integrator in percent (velocity error scheme)
    pub(crate) integrator_pct: f32,
    last_pct_ms: u32,
    last_pct: f32,
    /// forward throttle fraction from the tilt scheme
    fwd_throttle: f32,
    /// current nose down pitch allowance in degrees
    fwd_pitch_limit_deg: f32,
    back_pitch_filter: LowPassFilter,
    accel_filter: LowPassFilterVector3,
}

impl Default for ThrottleBlendState {
    fn default() -> Self {
        Self {
            integrator_pct: 0.0,
            last_pct_ms: 0,
            last_pct: 0.0,
            fwd_throttle: 0.0,
            fwd_pitch_limit_deg: 0.0,
            back_pitch_filter: LowPassFilter::with_cutoff(0.0),
            accel_filter: LowPassFilterVector3::with_cutoff(1.0),
        }
    }
}

impl ThrottleBlendState {
    pub(crate) fn reset(&mut self) {
        self.integrator_pct = 0.0;
        self.last_pct = 0.0;
        self.fwd_throttle = 0.0;
        self.back_pitch_filter.reset(0.0);
        self.accel_filter.reset(Vector3::zeros());
    }
}

impl<A, AC, PC, M, D, T, S> QuadPlane<A, AC, PC, M, D, T, S>
where
    A: Ahrs,
    AC: AttitudeControl,
    PC: PositionControl,
    M: Motors,
    D: AssistDecision,
    T: TelemetrySink,
    S: TransitionStrategy<A, AC, PC, M, D, T>,
{
    /// Convert demanded nose down pitch into forward throttle and cap the
    /// pitch demand. Also applies the pitch up cap that protects the back
    /// transition at speed.
    pub(crate) fn assign_fwd_throttle(&mut self, input: &TickInput, nav_pitch_deg: &mut f32) {
        let dt = input.dt_s;

        if self.config.bck_pitch_lim_deg > 0.0 {
            // pitching up hard while still fast flips the vehicle over;
            // the allowance opens as the airspeed bleeds off
            let aspeed = self
                .ahrs
                .airspeed_estimate()
                .unwrap_or_else(|| self.ahrs.groundspeed())
                .max(1.0);
            let ratio = self.config.airspeed_min.max(2.0) / aspeed;
            let limit = (self.config.bck_pitch_lim_deg * sq(ratio)).min(self.config.angle_max_deg);
            let filtered = self
                .blend
                .back_pitch_filter
                .apply_tconst(limit, BACK_PITCH_TCONST_S, dt);
            if *nav_pitch_deg > filtered {
                *nav_pitch_deg = filtered;
            }
        }

        if self.config.fwd_thr_gain <= 0.0 {
            self.blend.fwd_throttle = 0.0;
            return;
        }

        let min_lim = self.config.fwd_pitch_lim_deg;
        let max_lim = self.config.angle_max_deg.max(min_lim);
        let mut lim = constrain_float(self.blend.fwd_pitch_limit_deg, min_lim, max_lim);
        if self.pos.fwd_pitch_limited() {
            // the position controller wants more acceleration than the
            // forward throttle alone delivers
            lim = (lim + FWD_PITCH_LIMIT_SLEW * (max_lim - min_lim) * dt).min(max_lim);
        } else {
            lim = (lim - FWD_PITCH_LIMIT_SLEW * (max_lim - min_lim) * dt).max(min_lim);
        }
        // never open the allowance beyond what is being demanded
        lim = lim.min((-*nav_pitch_deg).max(min_lim));
        self.blend.fwd_pitch_limit_deg = lim;

        let fwd_tilt_deg = constrain_float(-*nav_pitch_deg, 0.0, 45.0);
        let mut fwd_throttle = (self.config.fwd_thr_gain * fwd_tilt_deg.to_radians().tan()).min(1.0);
        let alt_cutoff_m = self.config.vel_forward_alt_cutoff_m;
        if alt_cutoff_m > 0.0 && !self.in_vtol_land_approach() {
            fwd_throttle *= linear_interpolate(
                0.0,
                1.0,
                self.ahrs.height_above_ground_m(),
                alt_cutoff_m,
                alt_cutoff_m + 2.0,
            );
        }
        self.blend.fwd_throttle = fwd_throttle;

        if *nav_pitch_deg < -lim {
            *nav_pitch_deg = -lim;
        }
    }

    /// Forward throttle demand in percent for the forward propulsion while
    /// rotor borne.
    pub fn forward_throttle_pct(&mut self, input: &TickInput) -> f32 {
        if self.config.fwd_thr_gain > 0.0 {
            return self.blend.fwd_throttle * 100.0;
        }
        if self.config.vel_forward_gain <= 0.0 || input.mode.is_vtol_man_throttle() {
            self.blend.integrator_pct = 0.0;
            self.blend.last_pct = 0.0;
            return 0.0;
        }

        let now = input.now_ms;
        let since_ms = now.wrapping_sub(self.blend.last_pct_ms);
        if since_ms < VEL_FORWARD_PERIOD_MS {
            return self.blend.last_pct;
        }
        let dt = (since_ms as f32 * 0.001).min(0.5);
        self.blend.last_pct_ms = now;

        let vel_ned = match self.ahrs.velocity_ned() {
            Some(vel) => vel,
            None => {
                // dead reckoning, bleed the integrator off
                self.blend.integrator_pct *= 0.95;
                self.blend.last_pct = self.blend.integrator_pct;
                return self.blend.last_pct;
            }
        };

        let desired = self.pos.desired_velocity_neu_ms();
        let err_ne = Vector2::new(desired.x - vel_ned.x, desired.y - vel_ned.y);
        let yaw_rad = self.ahrs.yaw_deg().to_radians();
        let fwd_vel_error = err_ne.x * yaw_rad.cos() + err_ne.y * yaw_rad.sin();
        // a sustained nose down demand also drives forward throttle, so
        // the rotors can stay closer to level
        let pitch_term = self.config.wp_speed_ms * self.pos.pitch_deg()
            / self.config.pitch_limit_max_deg.max(1.0);
        let error_norm = (fwd_vel_error - pitch_term) / self.config.airspeed_max.max(5.0);

        self.blend.integrator_pct += error_norm * dt * self.config.vel_forward_gain * 100.0;
        self.blend.integrator_pct = constrain_float(
            self.blend.integrator_pct,
            self.config.throttle_min_pct,
            self.config.throttle_cruise_pct,
        );

        let mut out = self.blend.integrator_pct;
        if self.in_vtol_land_final() && self.motors.limit_throttle_lower() {
            // hard on the ground stops, no forward drive into the dirt
            self.blend.integrator_pct = 0.0;
            out = 0.0;
        } else if !self.in_vtol_land_approach() && self.config.vel_forward_alt_cutoff_m > 0.0 {
            out *= linear_interpolate(
                0.0,
                1.0,
                self.ahrs.height_above_ground_m(),
                self.config.vel_forward_alt_cutoff_m,
                self.config.vel_forward_alt_cutoff_m + 2.0,
            );
        }
        if out <= 0.01 {
            self.blend.integrator_pct *= 0.95;
        }
        self.blend.last_pct = out;
        out
    }

    /// Rotor throttle-vs-attitude priority. High priority whenever attitude
    /// matters more than altitude: large lean demands, big attitude error,
    /// measured acceleration, or the hover portion of a landing.
    pub(crate) fn update_throttle_mix(&mut self, input: &TickInput) {
        let accel_ef = self.ahrs.accel_ef_mss() + Vector3::new(0.0, 0.0, GRAVITY_MSS);
        let filtered = self.blend.accel_filter.apply(accel_ef, input.dt_s);

        if !self.transition.allow_update_throttle_mix() {
            return;
        }
        if !self.motors.armed() {
            self.attitude.set_throttle_mix_min();
            return;
        }

        if input.mode.is_vtol_man_throttle() {
            let throttle = input.pilot.map(|p| p.throttle).unwrap_or(0.0);
            if throttle > 0.0 {
                self.attitude.set_throttle_mix_man();
            } else {
                self.attitude.set_throttle_mix_min();
            }
            return;
        }

        let angle_target = self.attitude.attitude_target_euler_deg();
        let large_angle_request = angle_target.xy().norm() > 15.0;
        let large_attitude_error = self.attitude.attitude_error_deg() > 30.0;
        let accel_moving = filtered.norm() > 3.0;
        let not_descending = self.pos.desired_velocity_neu_ms().z >= 0.0;
        let landing_hover = self.in_vtol_land_sequence() && !self.in_vtol_land_final();

        if large_angle_request
            || large_attitude_error
            || accel_moving
            || not_descending
            || landing_hover
        {
            self.attitude.set_throttle_mix_max(1.0);
        } else {
            self.attitude.set_throttle_mix_min();
        }
    }
}
