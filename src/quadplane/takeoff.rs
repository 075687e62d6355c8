//! VTOL takeoff: a straight rotor borne climb over the launch point with a
//! wind and time based failure watchdog.

use crate::assist::AssistDecision;
use crate::hal::{Ahrs, AttitudeControl, DesiredSpoolState, Motors, PositionControl};
use crate::quadplane::{set_spool_state, ModeRequest, QuadPlane, TickInput};
use crate::telemetry::{Severity, StatusEvent, TelemetrySink};
use crate::transition::TransitionStrategy;
use crate::{approach, sq};
use nalgebra::Vector2;
use num_traits::Float;

/// controller re-initializes after a gap this long between runs
const TAKEOFF_RESTART_MS: u32 = 1000;
/// ground effect compensation window after liftoff
const TAKEOFF_EXPECTED_MS: u32 = 3000;

/// State of an active VTOL takeoff.
pub struct TakeoffState {
    /// a takeoff owns the rotor borne control loop while set
    pub(crate) active: bool,
    start_ms: u32,
    /// failure budget, 0 when the watchdog is disabled
    time_limit_ms: u32,
    start_alt_m: f32,
    last_run_ms: u32,
    /// a failure was already reported for this takeoff
    failed: bool,
}

impl Default for TakeoffState {
    fn default() -> Self {
        Self {
            active: false,
            start_ms: 0,
            time_limit_ms: 0,
            start_alt_m: 0.0,
            last_run_ms: 0,
            failed: false,
        }
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
    /// Start a VTOL takeoff to `target_alt_m` over the current position.
    /// Returns false when already at or above the target altitude.
    pub fn do_vtol_takeoff(&mut self, now_ms: u32, target_alt_m: f32) -> bool {
        let current = self.ahrs.position_neu_m();
        if current.z >= target_alt_m {
            return false;
        }
        self.poscontrol.target_neu_m.x = current.x;
        self.poscontrol.target_neu_m.y = current.y;
        self.poscontrol.target_neu_m.z = target_alt_m;
        self.poscontrol.landing_sequence = false;

        self.takeoff.active = true;
        self.takeoff.start_ms = now_ms;
        self.takeoff.start_alt_m = current.z;
        self.takeoff.failed = false;
        self.takeoff.time_limit_ms = if self.config.takeoff_failure_scalar > 0.0 {
            let vel_u_ms = self.ahrs.velocity_ned().map(|v| -v.z).unwrap_or(0.0);
            approach::takeoff_time_budget_ms(
                target_alt_m - current.z,
                self.config.pilot_accel_z_mss,
                self.config.wp_speed_up_ms,
                vel_u_ms,
                self.config.takeoff_failure_scalar,
            )
        } else {
            0
        };
        true
    }

    /// Per tick control during a VTOL takeoff. Driven by the update loop
    /// while a takeoff is active.
    pub(crate) fn takeoff_controller(
        &mut self,
        input: &TickInput,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
    ) {
        let now = input.now_ms;
        if !self.motors.armed() {
            // keep the reference point where we actually leave the ground
            self.takeoff.start_ms = now;
            self.takeoff.start_alt_m = self.ahrs.position_neu_m().z;
        }
        if now.wrapping_sub(self.takeoff.last_run_ms) > TAKEOFF_RESTART_MS {
            self.pos.init_ne_controller();
            self.pos.init_u_controller();
        }
        self.takeoff.last_run_ms = now;

        set_spool_state(&mut self.motors, DesiredSpoolState::ThrottleUnlimited);

        let height_m = self.ahrs.position_neu_m().z - self.takeoff.start_alt_m;
        if self.config.takeoff_navalt_min_m > 0.0 && height_m < self.config.takeoff_navalt_min_m {
            // too low for horizontal position control; GPS velocity noise
            // near the ground tips the vehicle over
            self.pos.relax_velocity_controller_ne();
        } else {
            let vel = self.landing_velocity_ne(now);
            self.pos.input_vel_accel_ne(vel, Vector2::zeros());
        }
        self.pos.update_ne_controller();

        self.pos.set_max_speed_accel_u(
            -self.config.pilot_velocity_z_max_dn_ms(),
            self.config.wp_speed_up_ms,
            self.config.pilot_accel_z_mss,
        );
        self.pos.input_climb_rate_ms(self.config.wp_speed_up_ms);
        self.pos.update_u_controller();

        *nav_roll_deg = self.pos.roll_deg();
        *nav_pitch_deg = self.pos.pitch_deg();
        self.assign_fwd_throttle(input, nav_pitch_deg);
        let pilot_yaw = input.pilot.map(|p| p.yaw_rate_dps).unwrap_or(0.0);
        self.attitude
            .input_euler_angle_yaw_rate(*nav_roll_deg, *nav_pitch_deg, pilot_yaw);
    }

    /// Check takeoff progress. Returns true once the target altitude is
    /// reached; a failed takeoff raises a [`ModeRequest::HoverLand`].
    pub fn verify_vtol_takeoff(&mut self, input: &TickInput) -> bool {
        let now = input.now_ms;
        if !self.motors.armed() {
            self.takeoff.start_ms = now;
            return false;
        }
        if self.takeoff.failed {
            return false;
        }

        if now.wrapping_sub(self.takeoff.start_ms) < TAKEOFF_EXPECTED_MS {
            self.ahrs
                .set_takeoff_expected(!self.config.disable_ground_effect_comp);
        }

        if self.takeoff.time_limit_ms > 0
            && now.wrapping_sub(self.takeoff.start_ms) > self.takeoff.time_limit_ms
        {
            self.takeoff.failed = true;
            self.telemetry
                .status(Severity::Critical, StatusEvent::TakeoffTimeout);
            self.pending_request = Some(ModeRequest::HoverLand);
            return false;
        }

        if self.config.maximum_takeoff_airspeed_ms > 0.0 {
            let airspeed_sq = self
                .ahrs
                .airspeed_estimate()
                .map(sq)
                .unwrap_or_else(|| self.ahrs.groundspeed_vector().norm_squared());
            if airspeed_sq > sq(self.config.maximum_takeoff_airspeed_ms) {
                self.takeoff.failed = true;
                self.telemetry.status(
                    Severity::Critical,
                    StatusEvent::TakeoffExcessiveWind {
                        airspeed_ms: airspeed_sq.sqrt(),
                    },
                );
                self.pending_request = Some(ModeRequest::HoverLand);
                return false;
            }
        }

        if self.ahrs.position_neu_m().z >= self.poscontrol.target_neu_m.z {
            // ready for the forward transition when a fixed wing mode wants it
            self.takeoff.active = false;
            self.transition.restart();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hal::doubles::{RecordingTelemetry, TestAhrs, TestAttitude, TestMotors, TestPos};
    use crate::quadplane::{FlightMode, QuadPlane};
    use crate::transition::{SltTransition, TransitionPhase};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    type TestPlane = QuadPlane<
        TestAhrs,
        TestAttitude,
        TestPos,
        TestMotors,
        crate::assist::ThresholdAssist,
        RecordingTelemetry,
    >;

    fn plane() -> TestPlane {
        let mut motors = TestMotors::default();
        motors.armed = true;
        motors.throttle = 0.5;
        QuadPlane::new(
            Config::default(),
            TestAhrs::default(),
            TestAttitude::default(),
            TestPos::default(),
            motors,
            crate::assist::ThresholdAssist::new(0.0, 0.0, 0.0, 0.0),
            RecordingTelemetry::default(),
            SltTransition::new(),
        )
    }

    fn takeoff_input(now_ms: u32) -> TickInput {
        TickInput {
            now_ms,
            dt_s: 0.1,
            mode: FlightMode::AutoVtol,
            nav_roll_deg: 0.0,
            nav_pitch_deg: 0.0,
            fw_throttle_pct: 0.0,
            fw_throttle_saturated: false,
            sink_rate_ms: 0.0,
            flying: false,
            target_neu_m: None,
            prev_wp_neu_m: None,
            pilot: None,
        }
    }

    #[test]
    fn already_airborne_takeoff_is_refused() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 40.0);
        assert!(!p.do_vtol_takeoff(1000, 30.0));
        assert!(p.do_vtol_takeoff(1000, 50.0));
    }

    #[test]
    fn stalled_takeoff_requests_hover_land_exactly_once() {
        let mut p = plane();
        p.config.takeoff_failure_scalar = 1.0;
        assert!(p.do_vtol_takeoff(0, 20.0));
        // 20 m at 2.5 m/s up: budget well under 15 s

        let mut requests = 0;
        for step in 1..300 {
            let now = step * 100;
            assert!(!p.verify_vtol_takeoff(&takeoff_input(now)));
            let out = p.update(&takeoff_input(now));
            if out.mode_request == Some(ModeRequest::HoverLand) {
                requests += 1;
            }
        }
        assert_eq!(requests, 1);
        assert_eq!(p.telemetry().count(StatusEvent::TakeoffTimeout), 1);
        // the takeoff controller kept climbing throughout
        assert!(!p.pos.climb_rates.is_empty());
    }

    #[test]
    fn climb_limits_use_a_negative_descent_speed() {
        let mut p = plane();
        assert!(p.do_vtol_takeoff(0, 20.0));
        p.update(&takeoff_input(100));

        let (down, up, accel) = p.pos.max_speed_accel_u.unwrap();
        assert_relative_eq!(down, -p.config.pilot_velocity_z_max_dn_ms());
        assert_relative_eq!(up, p.config.wp_speed_up_ms);
        assert!(accel > 0.0);
    }

    #[test]
    fn excessive_wind_aborts_the_takeoff() {
        let mut p = plane();
        p.config.maximum_takeoff_airspeed_ms = 10.0;
        assert!(p.do_vtol_takeoff(0, 20.0));
        p.ahrs.airspeed = Some(12.0);

        assert!(!p.verify_vtol_takeoff(&takeoff_input(500)));
        assert_eq!(
            p.telemetry()
                .count(StatusEvent::TakeoffExcessiveWind { airspeed_ms: 12.0 }),
            1
        );
        let out = p.update(&takeoff_input(600));
        assert_eq!(out.mode_request, Some(ModeRequest::HoverLand));
    }

    #[test]
    fn reaching_the_target_altitude_rearms_the_transition() {
        let mut p = plane();
        assert!(p.do_vtol_takeoff(0, 20.0));
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 10.0);
        assert!(!p.verify_vtol_takeoff(&takeoff_input(4000)));
        // ground effect window has passed
        assert!(!p.ahrs.takeoff_expected);

        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 20.5);
        assert!(p.verify_vtol_takeoff(&takeoff_input(8000)));
        assert_eq!(p.transition().phase(), TransitionPhase::AirspeedWait);
    }
}
