//! VTOL landing position state machine.
//!
//! A landing runs through a fixed phase sequence: a wing borne approach, an
//! airbrake with the rotors spooled, two rotor borne positioning phases, then
//! the vertical descent to touchdown. Phases only move forward except through
//! [`QuadPlane::abort_landing`].

use crate::assist::AssistDecision;
use crate::hal::{Ahrs, AttitudeControl, DesiredSpoolState, Motors, PositionControl};
use crate::quadplane::{
    coordinated_turn_yaw_rate_dps, set_spool_state, FlightMode, ModeRequest, QuadPlane, TickInput,
};
use crate::telemetry::{PosControlLog, Severity, StatusEvent, TelemetrySink};
use crate::transition::TransitionStrategy;
use crate::{approach, constrain_float, heading_deg, linear_interpolate, safe_sqrt, sq, wrap_180};
use nalgebra::{Vector2, Vector3};
use num_traits::Float;

/// Landing phase, in sequence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LandingPhase {
    /// no VTOL maneuver active
    None,
    /// wing borne flight toward the landing point
    Approach,
    /// rotors spooled, wing bleeding off speed
    Airbrake,
    /// rotor borne deceleration toward the landing point
    Position1,
    /// precise positioning over the landing point
    Position2,
    /// vertical descent toward the final approach altitude
    LandDescend,
    /// climb back to the altitude where the descent started
    LandAbort,
    /// final descent with ground effect expected
    LandFinal,
    /// on the ground
    LandComplete,
}

/// distance from the landing point at which POSITION2 can engage
const POSITION2_DIST_THRESHOLD_M: f32 = 10.0;
/// speed the deceleration profile aims for at the POSITION2 boundary
const POSITION2_TARGET_SPEED_MS: f32 = 3.0;
/// attitude error that ends the airbrake
const AIRBRAKE_ATTITUDE_ERROR_DEG: f32 = 10.0;
/// minimum time in the airbrake before any exit condition applies
const AIRBRAKE_MIN_MS: u32 = 1000;
/// sustained thrust loss before forcing rotor borne flight
const THRUST_LOSS_DWELL_MS: u32 = 5000;
/// landing target velocity matches older than this are discarded
const VELOCITY_MATCH_TIMEOUT_MS: u32 = 1000;
/// position error below which the descent may start
const LAND_DESCEND_DIST_M: f32 = 2.0;
/// ground speed below which the descent may start
const LAND_DESCEND_SPEED_MS: f32 = 3.0;
/// velocity direction error that counts as an overshoot
const OVERSHOOT_YAW_ERROR_DEG: f32 = 60.0;
/// landing detector dwell for touchdown in the final phase
const LAND_COMPLETE_TIMEOUT_MS: u32 = 4000;
/// longer detector dwell used when still expecting height progress
const LAND_PROGRESS_TIMEOUT_MS: u32 = 6000;
/// gap between runs after which the position controllers are stale
const POSCONTROL_RESTART_MS: u32 = 1000;

/// State carried by the position machine between ticks.
pub struct PosControlState {
    phase: LandingPhase,
    /// landing target in NEU meters
    pub(crate) target_neu_m: Vector3<f32>,
    /// pilot repositioning offset applied to the target
    pub(crate) correction_ne_m: Vector2<f32>,
    /// pilot repositioning velocity demand
    pub(crate) target_vel_ms: Vector2<f32>,
    overshoot: bool,
    pub(crate) pilot_correction_active: bool,
    pub(crate) pilot_correction_done: bool,
    thrust_loss_start_ms: u32,
    last_state_change_ms: u32,
    reached_wp_speed: bool,
    /// speed cap for POSITION1, latched from the groundspeed at entry
    pos1_speed_limit_ms: f32,
    done_accel_init: bool,
    /// velocity of a moving landing target
    pub(crate) velocity_match_ne_ms: Vector2<f32>,
    pub(crate) last_velocity_match_ms: u32,
    target_speed_ms: f32,
    target_accel_mss: f32,
    last_pos_reset_ms: u32,
    /// descend gradually along the approach leg instead of holding altitude
    pub(crate) slow_descent: bool,
    pub(crate) last_run_ms: u32,
    last_log_ms: u32,
    land_detect_start_ms: u32,
    land_detect_start_height_m: f32,
    descend_start_alt_m: f32,
    last_land_final_agl_m: f32,
    throttle_land_control: bool,
    /// a landing (rather than plain positioning) is in progress
    pub(crate) landing_sequence: bool,
}

impl Default for PosControlState {
    fn default() -> Self {
        Self {
            phase: LandingPhase::None,
            target_neu_m: Vector3::zeros(),
            correction_ne_m: Vector2::zeros(),
            target_vel_ms: Vector2::zeros(),
            overshoot: false,
            pilot_correction_active: false,
            pilot_correction_done: false,
            thrust_loss_start_ms: 0,
            last_state_change_ms: 0,
            reached_wp_speed: false,
            pos1_speed_limit_ms: 0.0,
            done_accel_init: false,
            velocity_match_ne_ms: Vector2::zeros(),
            last_velocity_match_ms: 0,
            target_speed_ms: 0.0,
            target_accel_mss: 0.0,
            last_pos_reset_ms: 0,
            slow_descent: false,
            last_run_ms: 0,
            last_log_ms: 0,
            land_detect_start_ms: 0,
            land_detect_start_height_m: 0.0,
            descend_start_alt_m: 0.0,
            last_land_final_agl_m: 0.0,
            throttle_land_control: false,
            landing_sequence: false,
        }
    }
}

impl PosControlState {
    pub fn phase(&self) -> LandingPhase {
        self.phase
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
    /// Move to a new landing phase, applying the entry effects once.
    pub(crate) fn set_phase(&mut self, phase: LandingPhase, now_ms: u32) {
        if phase == self.poscontrol.phase {
            return;
        }
        self.poscontrol.pilot_correction_done = false;
        match phase {
            LandingPhase::Position1 => {
                self.poscontrol.reached_wp_speed = false;
                self.attitude.reset_yaw_target_and_rate(false);
                self.poscontrol.pos1_speed_limit_ms = self.ahrs.groundspeed();
                self.poscontrol.done_accel_init = false;
            }
            LandingPhase::Airbrake => {
                self.pos.reset_vertical_accel_integrator();
            }
            LandingPhase::LandDescend => {
                self.poscontrol.throttle_land_control = false;
                self.poscontrol.descend_start_alt_m = self.ahrs.position_neu_m().z;
            }
            LandingPhase::LandAbort => {
                self.poscontrol.throttle_land_control = false;
                if self.poscontrol.phase == LandingPhase::Position2 {
                    // no descent happened yet, climb-out ends right here
                    self.poscontrol.descend_start_alt_m = self.ahrs.position_neu_m().z;
                }
            }
            LandingPhase::LandFinal => {
                self.poscontrol.last_pos_reset_ms = self.ahrs.last_position_reset_ms();
                self.poscontrol.land_detect_start_ms = 0;
            }
            _ => {}
        }
        // log both sides of the boundary
        self.log_pos_control();
        self.poscontrol.phase = phase;
        self.poscontrol.overshoot = false;
        self.log_pos_control();
        self.poscontrol.last_log_ms = now_ms;
        self.poscontrol.last_state_change_ms = now_ms;
        self.poscontrol.last_run_ms = now_ms;
    }

    fn log_pos_control(&mut self) {
        let distance_m =
            (self.poscontrol.target_neu_m.xy() - self.ahrs.position_neu_m().xy()).norm();
        let record = PosControlLog {
            phase: self.poscontrol.phase,
            distance_m,
            target_speed_ms: self.poscontrol.target_speed_ms,
            target_accel_mss: self.poscontrol.target_accel_mss,
            overshoot: self.poscontrol.overshoot,
        };
        self.telemetry.pos_control_log(&record);
    }

    /// Velocity of the landing target, zero once the match data goes stale.
    pub(crate) fn landing_velocity_ne(&self, now_ms: u32) -> Vector2<f32> {
        if self.poscontrol.last_velocity_match_ms != 0
            && now_ms.wrapping_sub(self.poscontrol.last_velocity_match_ms)
                < VELOCITY_MATCH_TIMEOUT_MS
        {
            self.poscontrol.velocity_match_ne_ms
        } else {
            Vector2::zeros()
        }
    }

    fn approach_speed_ms(&self) -> f32 {
        self.config
            .land_airspeed_ms
            .unwrap_or(0.5 * (self.config.airspeed_min + self.config.airspeed_cruise))
    }

    /// Desired closing velocity toward the landing point, relative to the
    /// target. Zero once the descent has started.
    fn desired_closing_velocity_ne(&self) -> Vector2<f32> {
        if self.poscontrol.phase >= LandingPhase::LandDescend {
            return Vector2::zeros();
        }
        let diff = self.poscontrol.target_neu_m.xy() - self.ahrs.position_neu_m().xy();
        let distance = diff.norm();
        if distance < 0.01 {
            return Vector2::zeros();
        }
        let ceiling = self.approach_speed_ms() * self.ahrs.eas2tas();
        let speed = approach::desired_closing_speed_ms(
            distance,
            self.config.transition_decel_mss,
            ceiling,
        );
        diff * (speed / distance)
    }

    /// Airspeed the wing borne speed controller should fly at during the
    /// landing sequence.
    pub fn landing_airspeed_ms(&self, now_ms: u32) -> f32 {
        match self.poscontrol.phase {
            LandingPhase::Approach => {
                let approach_speed = self.approach_speed_ms();
                let distance = (self.poscontrol.target_neu_m.xy()
                    - self.ahrs.position_neu_m().xy())
                .norm();
                let time_to_landing_s = distance / approach_speed.max(5.0);
                linear_interpolate(
                    approach_speed,
                    self.config.airspeed_cruise,
                    time_to_landing_s,
                    20.0,
                    60.0,
                )
            }
            LandingPhase::Airbrake => self.config.airspeed_min,
            _ => {
                let vel = self.desired_closing_velocity_ne() + self.landing_velocity_ne(now_ms)
                    - self.ahrs.wind_estimate_ne();
                vel.norm() / self.ahrs.eas2tas()
            }
        }
    }

    /// Horizontal and vertical position control for the rotor borne phases.
    /// Writes the attitude demands back through `nav_roll_deg`/`nav_pitch_deg`.
    pub fn vtol_position_controller(
        &mut self,
        input: &TickInput,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
    ) -> Option<ModeRequest> {
        let now = input.now_ms;
        if now.wrapping_sub(self.poscontrol.last_run_ms) > POSCONTROL_RESTART_MS {
            self.pos.init_ne_controller();
            self.pos.init_u_controller();
        }
        self.setup_target_position(input);

        if self.poscontrol.phase == LandingPhase::None {
            // resync to a conservative phase rather than fly with no state
            self.telemetry
                .status(Severity::Critical, StatusEvent::InternalError);
            self.set_phase(LandingPhase::Position1, now);
        }

        let position_ne = self.ahrs.position_neu_m().xy();
        let diff = self.poscontrol.target_neu_m.xy() - position_ne;
        let distance = diff.norm();
        let landing_vel = self.landing_velocity_ne(now);
        let rel_vel = self.ahrs.groundspeed_vector() - landing_vel;
        let aspeed = self
            .ahrs
            .airspeed_estimate()
            .unwrap_or_else(|| self.ahrs.groundspeed());

        match self.poscontrol.phase {
            LandingPhase::Approach | LandingPhase::Airbrake => {
                self.approach_controller(input, distance, diff, rel_vel, aspeed, now);
            }
            LandingPhase::Position1 => {
                self.position1_controller(
                    input,
                    distance,
                    diff,
                    rel_vel,
                    landing_vel,
                    now,
                    nav_roll_deg,
                    nav_pitch_deg,
                );
            }
            LandingPhase::Position2
            | LandingPhase::LandDescend
            | LandingPhase::LandAbort
            | LandingPhase::LandFinal => {
                self.position2_controller(input, landing_vel, now, nav_roll_deg, nav_pitch_deg);
            }
            LandingPhase::LandComplete => {
                set_spool_state(&mut self.motors, DesiredSpoolState::GroundIdle);
                self.pos.relax_velocity_controller_ne();
                self.pos.relax_u_controller(0.0);
                self.poscontrol.last_run_ms = now;
                return None;
            }
            LandingPhase::None => {}
        }

        self.run_vertical_controller(input, distance);

        if now.wrapping_sub(self.poscontrol.last_log_ms) >= 40 {
            self.poscontrol.last_log_ms = now;
            self.log_pos_control();
        }
        self.poscontrol.last_run_ms = now;
        None
    }

    fn approach_controller(
        &mut self,
        input: &TickInput,
        distance: f32,
        diff: Vector2<f32>,
        rel_vel: Vector2<f32>,
        aspeed: f32,
        now: u32,
    ) {
        let desired_closing_vel = self.desired_closing_velocity_ne();
        let desired_closing_speed = desired_closing_vel.norm();
        let closing_speed = if distance > 0.1 {
            rel_vel.dot(&(diff / distance))
        } else {
            0.0
        };
        let groundspeed = self.ahrs.groundspeed();
        let aspeed_threshold = (self.config.airspeed_min - 2.0).max(0.0);

        if self.poscontrol.phase == LandingPhase::Approach {
            if self.transition.assisted_flight() {
                set_spool_state(&mut self.motors, DesiredSpoolState::ThrottleUnlimited);
            } else {
                set_spool_state(&mut self.motors, DesiredSpoolState::GroundIdle);
            }

            let stop_distance_m = approach::stopping_distance_m(
                sq(closing_speed.max(0.0)),
                self.config.transition_decel_mss,
            );
            if distance < stop_distance_m + 2.0 * closing_speed {
                if self.motors.desired_spool_state() == DesiredSpoolState::ThrottleUnlimited {
                    // rotors already running, no airbrake needed
                    self.telemetry.status(
                        Severity::Info,
                        StatusEvent::VtolPosition1 {
                            groundspeed_ms: groundspeed,
                            distance_m: distance,
                        },
                    );
                    self.set_phase(LandingPhase::Position1, now);
                } else {
                    self.telemetry.status(
                        Severity::Info,
                        StatusEvent::VtolAirbrake {
                            groundspeed_ms: groundspeed,
                            distance_m: distance,
                            stop_distance_m,
                        },
                    );
                    self.set_phase(LandingPhase::Airbrake, now);
                }
            }
        }

        if self.poscontrol.phase == LandingPhase::Airbrake {
            set_spool_state(&mut self.motors, DesiredSpoolState::ThrottleUnlimited);
            self.pos.relax_velocity_controller_ne();

            let direction_error_deg = if desired_closing_speed > 0.1 && rel_vel.norm() > 0.1 {
                wrap_180(heading_deg(&rel_vel) - heading_deg(&desired_closing_vel)).abs()
            } else {
                0.0
            };
            let overspeed =
                closing_speed > (1.2 * desired_closing_speed).max(desired_closing_speed + 2.0);
            let underspeed = closing_speed < 0.5 * desired_closing_speed;
            let slow = aspeed < aspeed_threshold;
            let attitude_bad = self.attitude.attitude_error_deg() > AIRBRAKE_ATTITUDE_ERROR_DEG;

            if (slow
                || direction_error_deg > OVERSHOOT_YAW_ERROR_DEG
                || overspeed
                || underspeed
                || attitude_bad)
                && now.wrapping_sub(self.poscontrol.last_state_change_ms) > AIRBRAKE_MIN_MS
            {
                self.telemetry.status(
                    Severity::Info,
                    StatusEvent::VtolPosition1 {
                        groundspeed_ms: groundspeed,
                        distance_m: distance,
                    },
                );
                if self.config.vel_forward_gain > 0.0 {
                    // seed the forward throttle integrator from the fixed
                    // wing throttle, backed off when already closing fast
                    let seeded = linear_interpolate(
                        input.fw_throttle_pct,
                        0.0,
                        closing_speed,
                        0.5 * desired_closing_speed,
                        1.2 * desired_closing_speed,
                    );
                    self.blend.integrator_pct =
                        constrain_float(seeded, 0.0, 0.5 * self.config.throttle_cruise_pct);
                }
                let pitch = self.ahrs.pitch_deg();
                self.transition.set_last_fw_pitch(now, pitch);
                self.set_phase(LandingPhase::Position1, now);
                return;
            }
        }

        // losing altitude with the wing throttle saturated means the wing
        // can no longer hold the aircraft
        let rotors_engaged =
            self.motors.desired_spool_state() == DesiredSpoolState::ThrottleUnlimited;
        if input.fw_throttle_saturated
            && !rotors_engaged
            && input.sink_rate_ms > 0.2
            && aspeed < aspeed_threshold + 4.0
        {
            if self.poscontrol.thrust_loss_start_ms == 0 {
                self.poscontrol.thrust_loss_start_ms = now;
            } else if now.wrapping_sub(self.poscontrol.thrust_loss_start_ms)
                > THRUST_LOSS_DWELL_MS
            {
                self.telemetry.status(
                    Severity::Warning,
                    StatusEvent::ThrustLoss {
                        airspeed_ms: aspeed,
                        threshold_ms: aspeed_threshold + 4.0,
                    },
                );
                self.set_phase(LandingPhase::Position1, now);
                return;
            }
        } else {
            self.poscontrol.thrust_loss_start_ms = 0;
        }

        if self.poscontrol.phase == LandingPhase::Approach
            && aspeed < aspeed_threshold
            && !rotors_engaged
            && !self.transition.assisted_flight()
        {
            self.telemetry.status(
                Severity::Warning,
                StatusEvent::LowAirspeed {
                    airspeed_ms: aspeed,
                    threshold_ms: aspeed_threshold,
                },
            );
            self.set_phase(LandingPhase::Position1, now);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn position1_controller(
        &mut self,
        input: &TickInput,
        distance: f32,
        diff: Vector2<f32>,
        rel_vel: Vector2<f32>,
        landing_vel: Vector2<f32>,
        now: u32,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
    ) {
        set_spool_state(&mut self.motors, DesiredSpoolState::ThrottleUnlimited);
        if !self.pos.is_active_ne() {
            self.pos.init_ne_controller();
        }

        let wp_speed = self.config.wp_speed_ms;
        let decel = self.config.transition_decel_mss;
        let rel_speed = rel_vel.norm();
        let rel_speed_sq = rel_vel.norm_squared();

        // constant deceleration profile aiming for the POSITION2 speed at
        // the POSITION2 distance, capped by the entry groundspeed
        let mut target_speed = self
            .poscontrol
            .pos1_speed_limit_ms
            .max(2.0 * wp_speed)
            .min(safe_sqrt(
                (distance - POSITION2_DIST_THRESHOLD_M).max(0.0) * 2.0 * decel
                    + sq(POSITION2_TARGET_SPEED_MS),
            ));

        let yaw_error_deg = wrap_180(heading_deg(&diff) - self.ahrs.yaw_deg());
        let scaled_speed = approach::scaled_wp_speed_ms(yaw_error_deg, wp_speed);
        if self.poscontrol.reached_wp_speed
            || rel_speed_sq < sq(wp_speed)
            || wp_speed > 1.35 * scaled_speed
        {
            // once below the waypoint speed never let the demand rise above
            // it again, even if the landing point moves
            target_speed = target_speed.min(scaled_speed);
            self.poscontrol.reached_wp_speed = true;
        }

        let diff_norm = if distance > 0.1 {
            diff / distance
        } else {
            Vector2::zeros()
        };
        let closing_speed = rel_vel.dot(&diff_norm);
        let target_accel = approach::accel_needed_mss(distance, sq(closing_speed.max(0.0)));

        let mut target_vel_ne = diff_norm * target_speed;
        let mut accel_ne = -diff_norm * target_accel;

        let track_error_deg = if rel_speed > 0.1 {
            wrap_180(heading_deg(&rel_vel) - heading_deg(&diff)).abs()
        } else {
            0.0
        };
        let overshooting =
            distance > 1.0 && (closing_speed < 0.0 || track_error_deg > OVERSHOOT_YAW_ERROR_DEG);
        if overshooting && !self.poscontrol.overshoot {
            self.telemetry.status(
                Severity::Warning,
                StatusEvent::VtolOvershoot {
                    distance_m: distance,
                    closing_speed_ms: closing_speed,
                    yaw_error_deg: track_error_deg,
                },
            );
            self.poscontrol.overshoot = true;
            self.pos.set_accel_desired_ne(Vector2::zeros());
        }
        if self.poscontrol.overshoot {
            // past the point or flying the wrong way: no deceleration
            // demand, creep back at a distance scaled speed
            accel_ne = Vector2::zeros();
            let stopping = approach::stopping_distance_m(sq(wp_speed), decel);
            let retry_speed =
                linear_interpolate(3.0, wp_speed, distance, 15.0, 20.0 + stopping);
            target_vel_ne = diff_norm * retry_speed.min(target_speed);
        }
        target_vel_ne += landing_vel;

        if target_speed > 2.0 * wp_speed && rel_speed < target_speed && self.pos.pitch_deg() < 0.0
        {
            // not reaching the demanded speed nose down, so the cap is
            // unachievable; narrow it to what we actually fly
            self.poscontrol.pos1_speed_limit_ms = (2.0 * wp_speed).max(rel_speed);
        }

        if !self.poscontrol.done_accel_init {
            self.poscontrol.done_accel_init = true;
            self.pos.set_accel_desired_ne(accel_ne);
        }

        self.pos
            .set_max_speed_accel_ne(target_speed, 1.5 * target_accel.max(decel));
        self.pos.input_vel_accel_ne(target_vel_ne, accel_ne);
        self.pos.update_ne_controller();

        self.poscontrol.target_speed_ms = target_vel_ne.norm();
        self.poscontrol.target_accel_mss = target_accel;

        *nav_roll_deg = self.pos.roll_deg();
        *nav_pitch_deg = self.pos.pitch_deg();
        self.assign_fwd_throttle(input, nav_pitch_deg);

        let aspeed = self.ahrs.airspeed_estimate();
        if self.transition.set_vtol_roll_pitch_limit(
            nav_roll_deg,
            nav_pitch_deg,
            now,
            aspeed,
            &self.config,
        ) {
            self.pos.set_externally_limited_ne();
        }

        if self.poscontrol.overshoot {
            // keep the nose on the wind compensated course to the point
            let course_deg = heading_deg(&(diff - self.ahrs.wind_estimate_ne()));
            self.attitude
                .input_euler_angle_yaw_angle(*nav_roll_deg, *nav_pitch_deg, course_deg);
        } else {
            let yaw_rate =
                coordinated_turn_yaw_rate_dps(*nav_roll_deg, self.ahrs.groundspeed());
            self.attitude
                .input_euler_angle_yaw_rate(*nav_roll_deg, *nav_pitch_deg, yaw_rate);
        }

        if distance < POSITION2_DIST_THRESHOLD_M
            && rel_speed_sq < sq(3.0 * POSITION2_TARGET_SPEED_MS)
        {
            self.telemetry.status(
                Severity::Info,
                StatusEvent::VtolPosition2 {
                    groundspeed_ms: rel_speed,
                    distance_m: distance,
                },
            );
            self.set_phase(LandingPhase::Position2, now);
        }
    }

    fn position2_controller(
        &mut self,
        input: &TickInput,
        landing_vel: Vector2<f32>,
        now: u32,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
    ) {
        set_spool_state(&mut self.motors, DesiredSpoolState::ThrottleUnlimited);
        if !self.pos.is_active_ne() {
            self.pos.init_ne_controller();
        }
        self.update_land_positioning(input);

        let target_ne = self.poscontrol.target_neu_m.xy() + self.poscontrol.correction_ne_m;
        let target_vel = self.poscontrol.target_vel_ms + landing_vel;

        if self.poscontrol.phase == LandingPhase::LandFinal {
            let position_reset =
                self.ahrs.last_position_reset_ms() != self.poscontrol.last_pos_reset_ms;
            if self.should_relax(now) {
                self.pos.relax_velocity_controller_ne();
            } else if self.motors.limit_throttle_lower()
                || self.motors.throttle() < 0.5 * self.motors.throttle_hover()
                || position_reset
            {
                // position is no longer trusted, or we are partially on the
                // ground; fall back to velocity control
                self.pos.input_vel_accel_ne(landing_vel, Vector2::zeros());
            } else {
                self.pos
                    .input_pos_vel_accel_ne(target_ne, target_vel, Vector2::zeros());
            }
        } else {
            self.pos
                .input_pos_vel_accel_ne(target_ne, target_vel, Vector2::zeros());
        }
        self.pos.update_ne_controller();

        self.poscontrol.target_speed_ms = target_vel.norm();
        self.poscontrol.target_accel_mss = 0.0;

        *nav_roll_deg = self.pos.roll_deg();
        *nav_pitch_deg = self.pos.pitch_deg();
        self.assign_fwd_throttle(input, nav_pitch_deg);

        let aspeed = self.ahrs.airspeed_estimate();
        if self.transition.set_vtol_roll_pitch_limit(
            nav_roll_deg,
            nav_pitch_deg,
            now,
            aspeed,
            &self.config,
        ) {
            self.pos.set_externally_limited_ne();
        }

        let pilot_yaw = input.pilot.map(|p| p.yaw_rate_dps).unwrap_or(0.0);
        self.attitude
            .input_euler_angle_yaw_rate(*nav_roll_deg, *nav_pitch_deg, pilot_yaw);
    }

    fn run_vertical_controller(&mut self, input: &TickInput, distance: f32) {
        match self.poscontrol.phase {
            LandingPhase::Approach | LandingPhase::Airbrake => {
                if self.transition.assisted_flight() {
                    self.pos.input_climb_rate_ms(0.0);
                } else {
                    self.pos.relax_u_controller(0.0);
                }
            }
            LandingPhase::Position1 | LandingPhase::Position2 => match input.mode {
                FlightMode::Guided | FlightMode::AutoVtol => {
                    let mut target_u_m = self.poscontrol.target_neu_m.z;
                    if self.poscontrol.slow_descent {
                        if let Some(prev) = input.prev_wp_neu_m {
                            // descend along the leg rather than dropping at
                            // the end
                            let leg_m =
                                (self.poscontrol.target_neu_m.xy() - prev.xy()).norm();
                            if leg_m > 1.0 {
                                target_u_m = linear_interpolate(
                                    prev.z,
                                    self.poscontrol.target_neu_m.z,
                                    leg_m - distance,
                                    0.0,
                                    leg_m,
                                );
                            }
                        }
                    }
                    self.pos.input_pos_u_m(target_u_m);
                }
                FlightMode::HoverRtl => {
                    self.pos.input_pos_u_m(self.poscontrol.target_neu_m.z);
                }
                _ => self.pos.input_climb_rate_ms(0.0),
            },
            LandingPhase::LandDescend | LandingPhase::LandFinal => {
                let mut height_m = self.ahrs.height_above_ground_m();
                if self.poscontrol.phase == LandingPhase::LandFinal {
                    height_m = height_m.min(self.config.land_final_alt_m);
                }
                let mut descent_rate_ms = approach::landing_descent_rate_ms(
                    height_m,
                    self.config.land_final_speed_ms,
                    self.config.wp_speed_down_ms,
                    self.config.land_final_alt_m,
                );
                descent_rate_ms = self.apply_throttle_land_control(input, descent_rate_ms);
                if self.poscontrol.pilot_correction_active {
                    // repositioning pauses the descent
                    descent_rate_ms = 0.0;
                }
                if self.poscontrol.phase == LandingPhase::LandFinal {
                    self.ahrs
                        .set_touchdown_expected(!self.config.disable_ground_effect_comp);
                }
                self.pos
                    .land_at_climb_rate_ms(-descent_rate_ms, descent_rate_ms > 0.0);
            }
            LandingPhase::LandAbort => {
                self.pos.input_climb_rate_ms(self.config.wp_speed_up_ms);
            }
            LandingPhase::LandComplete | LandingPhase::None => return,
        }
        self.pos.update_u_controller();
    }

    /// Pilot throttle control of the landing descent. Above 60% throttle the
    /// pilot climbs, the middle band holds, below 40% the descent profile is
    /// scaled down.
    fn apply_throttle_land_control(&mut self, input: &TickInput, descent_rate_ms: f32) -> f32 {
        if !self.config.throttle_landing_control {
            return descent_rate_ms;
        }
        let pilot = match input.pilot {
            Some(pilot) => pilot,
            None => return descent_rate_ms,
        };
        if pilot.throttle > 0.6 {
            self.poscontrol.throttle_land_control = true;
        }
        if !self.poscontrol.throttle_land_control {
            return descent_rate_ms;
        }
        if pilot.throttle > 0.6 {
            -linear_interpolate(
                0.0,
                self.config.pilot_speed_z_max_up_ms,
                pilot.throttle,
                0.6,
                1.0,
            )
        } else if pilot.throttle >= 0.4 {
            0.0
        } else {
            descent_rate_ms * linear_interpolate(0.0, 1.0, pilot.throttle, 0.0, 0.4)
        }
    }

    /// Pilot repositioning during the hover phases of a landing. Sticks
    /// command a velocity in body frame, integrated into a target offset.
    fn update_land_positioning(&mut self, input: &TickInput) {
        if !self.config.reposition_landing {
            self.poscontrol.pilot_correction_active = false;
            self.poscontrol.target_vel_ms = Vector2::zeros();
            return;
        }
        let pilot = match input.pilot {
            Some(pilot) => pilot,
            None => {
                self.poscontrol.pilot_correction_active = false;
                self.poscontrol.target_vel_ms = Vector2::zeros();
                return;
            }
        };
        // correction speed that stops within half a second at wp accel
        let speed_max_ms = self.config.wp_accel_mss * 0.5;
        let body = Vector2::new(-pilot.pitch, pilot.roll) * speed_max_ms;
        let yaw_rad = self.ahrs.yaw_deg().to_radians();
        let (sin_yaw, cos_yaw) = (yaw_rad.sin(), yaw_rad.cos());
        let vel_ne = Vector2::new(
            body.x * cos_yaw - body.y * sin_yaw,
            body.x * sin_yaw + body.y * cos_yaw,
        );
        self.poscontrol.target_vel_ms = vel_ne;
        self.poscontrol.correction_ne_m += vel_ne * input.dt_s;
        self.poscontrol.pilot_correction_active = vel_ne.norm_squared() > 1e-6;
        if self.poscontrol.pilot_correction_active {
            self.poscontrol.pilot_correction_done = true;
        }
    }

    /// Advance the landing sequence. Returns true once the landing is done.
    pub fn verify_vtol_land(&mut self, input: &TickInput) -> bool {
        let now = input.now_ms;
        match self.poscontrol.phase {
            LandingPhase::Position2 => {
                let reached_position = if self.poscontrol.pilot_correction_done {
                    !self.poscontrol.pilot_correction_active
                } else {
                    let target_ne =
                        self.poscontrol.target_neu_m.xy() + self.poscontrol.correction_ne_m;
                    (target_ne - self.ahrs.position_neu_m().xy()).norm() < LAND_DESCEND_DIST_M
                };
                let rel_speed =
                    (self.ahrs.groundspeed_vector() - self.landing_velocity_ne(now)).norm();
                if reached_position && rel_speed < LAND_DESCEND_SPEED_MS {
                    self.poscontrol.last_land_final_agl_m = self.ahrs.height_above_ground_m();
                    self.telemetry
                        .status(Severity::Info, StatusEvent::LandDescendStarted);
                    self.set_phase(LandingPhase::LandDescend, now);
                }
                false
            }
            LandingPhase::LandDescend => {
                if self.check_land_final(now) {
                    self.telemetry
                        .status(Severity::Info, StatusEvent::LandFinalStarted);
                    self.set_phase(LandingPhase::LandFinal, now);
                }
                false
            }
            LandingPhase::LandFinal => {
                if self.land_detector(now, LAND_COMPLETE_TIMEOUT_MS) {
                    self.telemetry
                        .status(Severity::Info, StatusEvent::LandComplete);
                    self.set_phase(LandingPhase::LandComplete, now);
                    if !self.config.continue_after_land {
                        self.pending_request = Some(ModeRequest::Disarm);
                    }
                }
                self.poscontrol.phase == LandingPhase::LandComplete
            }
            LandingPhase::LandAbort => {
                self.ahrs.position_neu_m().z >= self.poscontrol.descend_start_alt_m
            }
            LandingPhase::LandComplete => true,
            _ => false,
        }
    }

    /// Ground proximity check for the switch to the final landing phase.
    fn check_land_final(&mut self, now: u32) -> bool {
        let height_m = self.ahrs.height_above_ground_m();
        if approach::land_final_trigger(
            height_m,
            self.poscontrol.last_land_final_agl_m,
            self.config.land_final_alt_m,
        ) {
            return true;
        }
        self.poscontrol.last_land_final_agl_m = height_m;
        // we may touch down before reaching the final altitude
        self.land_detector(now, LAND_PROGRESS_TIMEOUT_MS)
    }

    /// True when the vehicle has been motionless with the motors pinned at
    /// their lower limit for `timeout_ms`.
    fn land_detector(&mut self, now: u32, timeout_ms: u32) -> bool {
        if !self.should_relax(now) || self.poscontrol.pilot_correction_active {
            self.poscontrol.land_detect_start_ms = 0;
            return false;
        }
        let height_m = self.ahrs.position_neu_m().z;
        if self.poscontrol.land_detect_start_ms == 0
            || (height_m - self.poscontrol.land_detect_start_height_m).abs()
                > self.config.land_detect_alt_change_m
        {
            self.poscontrol.land_detect_start_ms = now;
            self.poscontrol.land_detect_start_height_m = height_m;
            return false;
        }
        now.wrapping_sub(self.poscontrol.land_detect_start_ms) > timeout_ms
            && now.wrapping_sub(self.motors_lower_limit_start_ms) > timeout_ms + 1000
    }

    /// Abort a landing descent, climbing back to the descent start altitude.
    pub fn abort_landing(&mut self, now_ms: u32) -> bool {
        if matches!(
            self.poscontrol.phase,
            LandingPhase::Position2 | LandingPhase::LandDescend | LandingPhase::LandFinal
        ) {
            self.set_phase(LandingPhase::LandAbort, now_ms);
            true
        } else {
            false
        }
    }

    /// Choose the initial landing phase based on distance to the target.
    pub fn poscontrol_init_approach(&mut self, now_ms: u32) {
        let distance = (self.poscontrol.target_neu_m.xy() - self.ahrs.position_neu_m().xy()).norm();
        let skip_approach = self.config.disable_approach
            || (self.config.approach_distance_m > 0.0
                && distance < self.config.approach_distance_m);
        if skip_approach {
            self.set_phase(LandingPhase::Position1, now_ms);
        } else if self.poscontrol.phase != LandingPhase::Approach {
            let threshold = approach::transition_threshold_m(
                self.config.airspeed_cruise,
                self.config.transition_decel_mss,
            );
            if distance < threshold {
                if self.motors.desired_spool_state() == DesiredSpoolState::ThrottleUnlimited {
                    self.telemetry.status(
                        Severity::Info,
                        StatusEvent::VtolPosition1 {
                            groundspeed_ms: self.ahrs.groundspeed(),
                            distance_m: distance,
                        },
                    );
                    self.set_phase(LandingPhase::Position1, now_ms);
                } else {
                    self.telemetry.status(
                        Severity::Info,
                        StatusEvent::VtolAirbrake {
                            groundspeed_ms: self.ahrs.groundspeed(),
                            distance_m: distance,
                            stop_distance_m: approach::stopping_distance_m(
                                sq(self.ahrs.groundspeed()),
                                self.config.transition_decel_mss,
                            ),
                        },
                    );
                    self.set_phase(LandingPhase::Airbrake, now_ms);
                }
            } else {
                self.telemetry.status(
                    Severity::Info,
                    StatusEvent::VtolApproach {
                        distance_m: distance,
                    },
                );
                self.set_phase(LandingPhase::Approach, now_ms);
            }
            self.poscontrol.thrust_loss_start_ms = 0;
        }
        self.poscontrol.pilot_correction_done = false;
        self.poscontrol.correction_ne_m = Vector2::zeros();
        self.poscontrol.slow_descent = false;
    }

    /// Start a VTOL landing at `target_ne_m`, descending from the current
    /// altitude.
    pub fn do_vtol_land(&mut self, now_ms: u32, target_ne_m: Vector2<f32>) {
        let current = self.ahrs.position_neu_m();
        self.poscontrol.target_neu_m = Vector3::new(target_ne_m.x, target_ne_m.y, current.z);
        self.poscontrol.land_detect_start_ms = 0;
        self.poscontrol.landing_sequence = true;
        self.poscontrol_init_approach(now_ms);
        let distance = (target_ne_m - current.xy()).norm();
        self.poscontrol.slow_descent = distance > 50.0;
    }

    fn setup_target_position(&mut self, input: &TickInput) {
        if let Some(target) = input.target_neu_m {
            self.poscontrol.target_neu_m.x = target.x;
            self.poscontrol.target_neu_m.y = target.y;
            if !self.poscontrol.landing_sequence {
                self.poscontrol.target_neu_m.z = target.z;
            }
        }
        self.pos
            .set_max_speed_accel_ne(self.config.wp_speed_ms, self.config.wp_accel_mss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hal::doubles::{RecordingTelemetry, TestAhrs, TestAttitude, TestMotors, TestPos};
    use crate::quadplane::{FlightMode, QuadPlane};
    use crate::transition::SltTransition;
    use approx::assert_relative_eq;

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
        motors.throttle = 0.3;
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

    fn land_input(now_ms: u32) -> TickInput {
        TickInput {
            now_ms,
            dt_s: 0.1,
            mode: FlightMode::HoverLand,
            nav_roll_deg: 0.0,
            nav_pitch_deg: 0.0,
            fw_throttle_pct: 0.0,
            fw_throttle_saturated: false,
            sink_rate_ms: 0.0,
            flying: true,
            target_neu_m: None,
            prev_wp_neu_m: None,
            pilot: None,
        }
    }

    #[test]
    fn landing_starts_with_approach_when_far_out() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 60.0);
        p.do_vtol_land(1000, Vector2::new(200.0, 0.0));
        assert_eq!(p.landing_phase(), LandingPhase::Approach);
        assert_eq!(
            p.telemetry().count(StatusEvent::VtolApproach { distance_m: 200.0 }),
            1
        );
        assert!(p.poscontrol.slow_descent);
        assert!(p.in_vtol_land_approach());
    }

    #[test]
    fn airbrake_engages_within_stopping_distance() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 60.0);
        p.ahrs.groundspeed_ne = Vector2::new(10.0, 0.0);
        p.ahrs.airspeed = Some(15.0);
        p.do_vtol_land(1000, Vector2::new(200.0, 0.0));
        assert_eq!(p.landing_phase(), LandingPhase::Approach);

        // 10 m/s closing at 2 m/s/s stops in 25 m, plus a 20 m margin
        p.ahrs.position_neu_m = Vector3::new(150.0, 0.0, 60.0);
        p.update(&land_input(1100));
        assert_eq!(p.landing_phase(), LandingPhase::Approach);

        p.ahrs.position_neu_m = Vector3::new(160.0, 0.0, 60.0);
        p.update(&land_input(1200));
        assert_eq!(p.landing_phase(), LandingPhase::Airbrake);
        assert_eq!(p.motors().desired, DesiredSpoolState::ThrottleUnlimited);

        // exit requires a full second in the airbrake even when slow
        p.ahrs.airspeed = Some(4.0);
        p.update(&land_input(1300));
        assert_eq!(p.landing_phase(), LandingPhase::Airbrake);
        p.update(&land_input(2300));
        assert_eq!(p.landing_phase(), LandingPhase::Position1);
    }

    #[test]
    fn a_long_gap_reinitializes_the_position_controller() {
        let mut p = plane();
        p.config.disable_approach = true;
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.0);
        p.ahrs.groundspeed_ne = Vector2::new(2.0, 0.0);
        p.do_vtol_land(1000, Vector2::new(50.0, 0.0));
        assert_eq!(p.landing_phase(), LandingPhase::Position1);

        p.update(&land_input(1100));
        assert_eq!(p.pos.init_ne_calls, 1);
        assert_eq!(p.pos.init_u_calls, 0);

        // a stalled scheduler leaves the controllers holding stale state
        p.update(&land_input(2500));
        assert_eq!(p.pos.init_ne_calls, 2);
        assert_eq!(p.pos.init_u_calls, 1);
    }

    #[test]
    fn position1_hands_over_to_position2_when_slow_and_close() {
        let mut p = plane();
        p.config.disable_approach = true;
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.0);
        p.ahrs.groundspeed_ne = Vector2::new(2.0, 0.0);
        p.ahrs.yaw_deg = 0.0;
        p.do_vtol_land(1000, Vector2::new(8.0, 0.0));
        assert_eq!(p.landing_phase(), LandingPhase::Position1);

        let out = p.update(&land_input(1100));
        assert_eq!(p.landing_phase(), LandingPhase::Position2);
        assert_eq!(
            p.telemetry().count(StatusEvent::VtolPosition2 {
                groundspeed_ms: 2.0,
                distance_m: 8.0,
            }),
            1
        );
        // attitude demands come from the position controller
        assert_eq!(out.mode_request, None);
        assert!(p.pos.update_ne_calls > 0);
    }

    #[test]
    fn overshoot_warns_once_and_zeroes_the_accel_demand() {
        let mut p = plane();
        p.config.disable_approach = true;
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.0);
        // flying away from a target 30 m behind us
        p.ahrs.groundspeed_ne = Vector2::new(8.0, 0.0);
        p.ahrs.yaw_deg = 0.0;
        p.do_vtol_land(1000, Vector2::new(-30.0, 0.0));
        assert_eq!(p.landing_phase(), LandingPhase::Position1);

        p.update(&land_input(1100));
        p.update(&land_input(1200));
        let overshoots = p
            .telemetry()
            .events
            .iter()
            .filter(|(_, e)| matches!(e, StatusEvent::VtolOvershoot { .. }))
            .count();
        assert_eq!(overshoots, 1);
        assert_eq!(p.pos.last_accel_ne_mss, Some(Vector2::zeros()));
        // while overshooting the nose is held on the course to the point
        assert!(p.attitude.last_yaw_deg.is_some());
        assert_relative_eq!(p.attitude.last_yaw_deg.unwrap(), 180.0, epsilon = 1.0);
    }

    #[test]
    fn descend_starts_only_when_close_and_slow() {
        let mut p = plane();
        p.config.disable_approach = true;
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 20.0);
        p.ahrs.height_m = 20.0;
        p.do_vtol_land(1000, Vector2::new(0.5, 0.0));
        p.set_phase(LandingPhase::Position2, 1000);

        // too fast
        p.ahrs.groundspeed_ne = Vector2::new(4.0, 0.0);
        assert!(!p.verify_vtol_land(&land_input(1100)));
        assert_eq!(p.landing_phase(), LandingPhase::Position2);

        p.ahrs.groundspeed_ne = Vector2::new(0.5, 0.0);
        assert!(!p.verify_vtol_land(&land_input(1200)));
        assert_eq!(p.landing_phase(), LandingPhase::LandDescend);
        assert_eq!(p.telemetry().count(StatusEvent::LandDescendStarted), 1);
        assert!(p.in_vtol_land_descent());
    }

    #[test]
    fn final_phase_trigger_rejects_a_rangefinder_glitch() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 20.0);
        p.ahrs.height_m = 20.0;
        p.poscontrol.landing_sequence = true;
        p.set_phase(LandingPhase::LandDescend, 1000);
        p.poscontrol.last_land_final_agl_m = 20.0;

        // a single low reading after 20 m is a glitch
        p.ahrs.height_m = 3.0;
        assert!(!p.verify_vtol_land(&land_input(1100)));
        assert_eq!(p.landing_phase(), LandingPhase::LandDescend);

        // a second consistent reading triggers the final phase
        assert!(!p.verify_vtol_land(&land_input(1200)));
        assert_eq!(p.landing_phase(), LandingPhase::LandFinal);
        assert_eq!(p.telemetry().count(StatusEvent::LandFinalStarted), 1);
    }

    #[test]
    fn land_complete_requests_disarm_once() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 0.0);
        p.ahrs.height_m = 0.5;
        p.poscontrol.landing_sequence = true;
        p.set_phase(LandingPhase::LandFinal, 0);
        p.motors.limit_lower = true;
        p.motors.throttle = 0.0;
        p.attitude.mix_min_active = true;

        let mut disarm_at = None;
        for step in 1..140 {
            let now = step * 100;
            let out = p.update(&land_input(now));
            if out.mode_request == Some(ModeRequest::Disarm) && disarm_at.is_none() {
                disarm_at = Some(now);
            }
            p.verify_vtol_land(&land_input(now));
        }
        assert_eq!(p.landing_phase(), LandingPhase::LandComplete);
        assert_eq!(p.telemetry().count(StatusEvent::LandComplete), 1);
        // detector needs the 4s dwell plus the extra second at lower limit
        let disarm_at = disarm_at.expect("no disarm requested");
        assert!(disarm_at > 5000, "disarmed too early at {disarm_at}");
    }

    #[test]
    fn final_phase_falls_back_to_velocity_control_after_a_position_reset() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 5.0);
        p.ahrs.height_m = 5.0;
        p.poscontrol.landing_sequence = true;
        p.set_phase(LandingPhase::LandFinal, 1000);

        p.update(&land_input(1100));
        assert!(p.pos.last_pos_ne_m.is_some());

        p.ahrs.position_reset_ms = 1150;
        p.update(&land_input(1200));
        assert!(p.pos.last_pos_ne_m.is_none());
        assert_eq!(p.pos.last_vel_ne_ms, Some(Vector2::zeros()));
    }

    #[test]
    fn missing_phase_resyncs_with_an_internal_error() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.0);
        let mut input = land_input(1000);
        input.mode = FlightMode::Guided;
        input.target_neu_m = Some(Vector3::new(5.0, 0.0, 30.0));
        p.update(&input);
        assert_eq!(p.telemetry().count(StatusEvent::InternalError), 1);
        assert!(p.landing_phase() >= LandingPhase::Position1);
    }

    #[test]
    fn pilot_repositioning_pauses_the_descent() {
        let mut p = plane();
        p.config.reposition_landing = true;
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 10.0);
        p.ahrs.height_m = 10.0;
        p.poscontrol.landing_sequence = true;
        p.set_phase(LandingPhase::LandDescend, 1000);

        let mut input = land_input(1100);
        input.pilot = Some(crate::quadplane::PilotInput {
            roll: 1.0,
            pitch: 0.0,
            yaw_rate_dps: 0.0,
            throttle: 0.5,
        });
        p.update(&input);
        let (rate, _) = *p.pos.land_rates.last().unwrap();
        assert_eq!(rate, 0.0);
        assert!(p.poscontrol.correction_ne_m.norm() > 0.0);
        assert!(p.poscontrol.pilot_correction_active);

        // sticks released: descent resumes
        input.pilot = None;
        input.now_ms = 1200;
        p.update(&input);
        let (rate, _) = *p.pos.land_rates.last().unwrap();
        assert!(rate < 0.0);
    }

    #[test]
    fn abort_climbs_back_to_the_descent_start_altitude() {
        let mut p = plane();
        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.0);
        p.ahrs.height_m = 30.0;
        p.poscontrol.landing_sequence = true;
        p.set_phase(LandingPhase::LandDescend, 1000);
        assert_relative_eq!(p.poscontrol.descend_start_alt_m, 30.0);

        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 12.0);
        assert!(p.abort_landing(2000));
        assert_eq!(p.landing_phase(), LandingPhase::LandAbort);
        assert!(!p.verify_vtol_land(&land_input(2100)));

        p.update(&land_input(2100));
        assert_eq!(
            *p.pos.climb_rates.last().unwrap(),
            p.config.wp_speed_up_ms
        );

        p.ahrs.position_neu_m = Vector3::new(0.0, 0.0, 30.5);
        assert!(p.verify_vtol_land(&land_input(9000)));
    }
}
