//! Forward and backward transition control.
//!
//! A forward transition hands authority from the lift rotors to the wing in
//! three stages: wait for airspeed, ramp the rotor throttle down over a fixed
//! time, done. A backward transition is immediate but constrains pitch through
//! an expanding envelope seeded from the last fixed wing pitch.
//!
//! [`TransitionStrategy`] is the seam for airframe specific behavior;
//! [`SltTransition`] is the separate lift/thrust implementation and the sole
//! owner of the transition timers.

use crate::assist::{AssistContext, AssistDecision};
use crate::config::{Config, TransitionFailureAction};
use crate::hal::{Ahrs, AttitudeControl, DesiredSpoolState, Motors, PositionControl};
use crate::quadplane::{coordinated_turn_yaw_rate_dps, set_spool_state, ModeRequest};
use crate::telemetry::{MavVtolState, Severity, StatusEvent, TelemetrySink};
use crate::{constrain_float, linear_interpolate};
use num_traits::Float;
use pid_controller::P;

/// Stage of the forward transition. Advances only forward except on a reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionPhase {
    /// rotors hold the aircraft while the wing gains airspeed
    AirspeedWait,
    /// airspeed reached, rotor throttle ramps down
    Timer,
    /// wing borne flight
    Done,
}

/// Per tick readings and collaborator handles consumed by a transition
/// strategy. Built fresh by the update driver each tick.
pub struct TransitionCtx<'a, A, AC, PC, M, D, T> {
    pub now_ms: u32,
    pub config: &'a Config,
    /// fixed wing navigation demands for this tick (degrees)
    pub nav_roll_deg: f32,
    pub nav_pitch_deg: f32,
    /// pilot throttle input in [0, 1]
    pub pilot_throttle: f32,
    /// vehicle level is-flying estimate
    pub flying: bool,
    /// waiting for pilot throttle before a VTOL takeoff
    pub throttle_wait: bool,
    pub ahrs: &'a A,
    pub attitude: &'a mut AC,
    pub pos: &'a mut PC,
    pub motors: &'a mut M,
    pub assist: &'a mut D,
    pub telemetry: &'a mut T,
}

/// Airframe specific transition behavior. Exactly one implementation is
/// active per vehicle and it exclusively owns the transition timers.
pub trait TransitionStrategy<A, AC, PC, M, D, T>
where
    A: Ahrs,
    AC: AttitudeControl,
    PC: PositionControl,
    M: Motors,
    D: AssistDecision,
    T: TelemetrySink,
{
    /// Per tick update while in a wing borne mode. A returned request asks
    /// the mode layer for a recovery mode change; it is never applied here.
    fn update(&mut self, ctx: &mut TransitionCtx<'_, A, AC, PC, M, D, T>) -> Option<ModeRequest>;

    /// Per tick update while in a rotor borne mode.
    fn vtol_update(&mut self, ctx: &mut TransitionCtx<'_, A, AC, PC, M, D, T>);

    /// Snap to the completed state (e.g. entering a fixed wing mode at speed).
    fn force_completion(&mut self, now_ms: u32, pitch_deg: f32, assist: &mut D);

    /// Re-arm the full transition sequence (after a VTOL takeoff completes).
    fn restart(&mut self);

    fn complete(&self) -> bool;

    /// True while rotor assistance is shaping the forward transition.
    fn assisted_flight(&self) -> bool;

    /// True when the forward motors pull the aircraft through an active
    /// forward transition.
    fn active_frwd(&self, in_vtol_airbrake: bool) -> bool;

    /// Whether the pilot facing view should be the VTOL one.
    fn show_vtol_view(&self, in_vtol_mode: bool) -> bool;

    /// Constrain the fixed wing pitch demand during an active transition.
    fn set_fw_roll_pitch(
        &self,
        nav_pitch_deg: &mut f32,
        show_vtol_view: bool,
        in_vtol_airbrake: bool,
        fw_manual_throttle: bool,
        groundspeed_ms: f32,
        config: &Config,
    );

    /// Constrain the fixed wing roll demand while a level transition runs.
    fn set_fw_roll_limit(&self, nav_roll_deg: &mut f32, config: &Config);

    /// False while the transition manages the throttle-vs-attitude mix
    /// itself.
    fn allow_update_throttle_mix(&self) -> bool;

    fn allow_stick_mixing(&self) -> bool;

    /// Record the fixed wing pitch baseline for the back transition envelope.
    fn set_last_fw_pitch(&mut self, now_ms: u32, pitch_deg: f32);

    /// Apply the VTOL attitude envelope to the given demands. Returns true
    /// when a limit clipped a demand, so the caller can mark the external
    /// position controller as externally limited.
    fn set_vtol_roll_pitch_limit(
        &mut self,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
        now_ms: u32,
        airspeed: Option<f32>,
        config: &Config,
    ) -> bool;

    fn get_mav_vtol_state(&self, in_vtol_mode: bool, in_airbrake_or_pos1: bool) -> MavVtolState;
}

// rotor throttle never ramps fully to zero while the timer runs
const TRANSITION_MIN_THROTTLE: f32 = 0.01;

// below this groundspeed the pitch demand is zeroed while waiting for
// airspeed, so a stationary aircraft does not pitch into the ground
const AIRSPEED_WAIT_PITCH_GROUNDSPEED_MS: f32 = 3.0;

// the assist climb rate ramps in over this window after assistance engages
const ASSIST_CLIMB_RAMP_MS: u32 = 2000;

// pitch up limit as airspeed approaches zero; more than angle_max is only
// allowed when the control surfaces have no authority left to reverse
const PITCH_UP_ZERO_AIRSPEED_DEG: f32 = 45.0;

/// Transition controller for separate lift/thrust airframes: fixed lift
/// rotors plus a forward motor.
pub struct SltTransition {
    phase: TransitionPhase,
    /// when the current forward transition began, 0 when none is running
    transition_start_ms: u32,
    /// last time airspeed was below the transition threshold
    low_airspeed_ms: u32,
    assist_start_ms: u32,
    /// transition was completed by the failure handler, not by airspeed
    in_forced_transition: bool,
    assisted_flight: bool,
    warned_failure: bool,
    /// rotor throttle at the moment airspeed was reached, start of the ramp
    last_throttle: f32,
    last_fw_pitch_deg: f32,
    last_fw_mode_ms: u32,
    /// maps the fixed wing pitch demand fraction to an assist climb rate
    pub climb: P<f32>,
}

impl Default for SltTransition {
    fn default() -> Self {
        Self::new()
    }
}

impl SltTransition {
    pub fn new() -> Self {
        Self {
            phase: TransitionPhase::Done,
            transition_start_ms: 0,
            low_airspeed_ms: 0,
            assist_start_ms: 0,
            in_forced_transition: false,
            assisted_flight: false,
            warned_failure: false,
            last_throttle: 0.0,
            last_fw_pitch_deg: 0.0,
            last_fw_mode_ms: 0,
            climb: P::default(),
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn in_forced_transition(&self) -> bool {
        self.in_forced_transition
    }

    pub fn complete(&self) -> bool {
        self.phase == TransitionPhase::Done
    }

    /// Re-arm the full transition sequence.
    pub fn restart(&mut self) {
        self.phase = TransitionPhase::AirspeedWait;
        self.transition_start_ms = 0;
        self.low_airspeed_ms = 0;
        self.warned_failure = false;
    }

    fn record_fw_pitch(&mut self, now_ms: u32, pitch_deg: f32) {
        self.last_fw_pitch_deg = pitch_deg;
        self.last_fw_mode_ms = now_ms;
    }

    /// Climb rate to hold while the rotors assist the wing, from the pilot
    /// throttle and the fixed wing pitch demand, ramped in over two seconds.
    fn assist_climb_rate_ms(
        &self,
        now_ms: u32,
        nav_pitch_deg: f32,
        pilot_throttle: f32,
        config: &Config,
    ) -> f32 {
        let pitch_fraction = nav_pitch_deg / config.pitch_limit_max_deg.max(1.0);
        let mut climb_rate = self.climb.control_with_error(pitch_fraction) * pilot_throttle;
        climb_rate = constrain_float(
            climb_rate,
            -config.pilot_velocity_z_max_dn_ms(),
            config.pilot_speed_z_max_up_ms,
        );

        let since_start_ms = now_ms.wrapping_sub(self.assist_start_ms);
        if since_start_ms < ASSIST_CLIMB_RAMP_MS {
            climb_rate = linear_interpolate(
                0.0,
                climb_rate,
                since_start_ms as f32,
                0.0,
                ASSIST_CLIMB_RAMP_MS as f32,
            );
        }
        climb_rate
    }
}

// hold position-free hover: attitude from the fixed wing navigation demands,
// altitude from the vertical position controller
fn hold_hover<AC: AttitudeControl, PC: PositionControl>(
    attitude: &mut AC,
    pos: &mut PC,
    config: &Config,
    nav_roll_deg: f32,
    nav_pitch_deg: f32,
    yaw_rate_dps: f32,
    climb_rate_ms: f32,
) {
    pos.set_max_speed_accel_u(
        -config.pilot_velocity_z_max_dn_ms(),
        config.pilot_speed_z_max_up_ms,
        config.pilot_accel_z_mss,
    );
    stabilize_attitude(attitude, config, nav_roll_deg, nav_pitch_deg, yaw_rate_dps);
    pos.input_climb_rate_ms(climb_rate_ms);
    pos.update_u_controller();
}

fn stabilize_attitude<AC: AttitudeControl>(
    attitude: &mut AC,
    config: &Config,
    nav_roll_deg: f32,
    nav_pitch_deg: f32,
    yaw_rate_dps: f32,
) {
    let roll = constrain_float(nav_roll_deg, -config.angle_max_deg, config.angle_max_deg);
    let pitch = constrain_float(nav_pitch_deg, -config.angle_max_deg, config.angle_max_deg);
    attitude.input_euler_angle_yaw_rate(roll, pitch, yaw_rate_dps);
}

impl<A, AC, PC, M, D, T> TransitionStrategy<A, AC, PC, M, D, T> for SltTransition
where
    A: Ahrs,
    AC: AttitudeControl,
    PC: PositionControl,
    M: Motors,
    D: AssistDecision,
    T: TelemetrySink,
{
    fn update(&mut self, ctx: &mut TransitionCtx<'_, A, AC, PC, M, D, T>) -> Option<ModeRequest> {
        let now = ctx.now_ms;

        if !ctx.motors.armed() {
            // the failure timer must not run on the ground
            self.transition_start_ms = now;
            self.warned_failure = false;
        }

        let airspeed = ctx.ahrs.airspeed_estimate();

        let assist_ctx = AssistContext {
            now_ms: now,
            armed_and_spooled: ctx.motors.armed()
                && ctx.motors.desired_spool_state() > DesiredSpoolState::GroundIdle,
            height_above_ground_m: ctx.ahrs.height_above_ground_m(),
            roll_deg: ctx.ahrs.roll_deg(),
            pitch_deg: ctx.ahrs.pitch_deg(),
            roll_limit_deg: ctx.config.roll_limit_deg,
            pitch_limit_max_deg: ctx.config.pitch_limit_max_deg,
            pitch_limit_min_deg: ctx.config.pitch_limit_min_deg,
        };
        let assist = ctx.assist.should_assist(airspeed, &assist_ctx);
        if assist && !self.in_forced_transition {
            if self.phase != TransitionPhase::AirspeedWait {
                self.phase = TransitionPhase::AirspeedWait;
                self.transition_start_ms = 0;
                ctx.telemetry.status(
                    Severity::Info,
                    StatusEvent::TransitionStarted {
                        airspeed_ms: airspeed.unwrap_or(0.0),
                    },
                );
            }
            if !self.assisted_flight {
                self.assist_start_ms = now;
            }
        }
        self.assisted_flight = assist;

        let turn_speed = airspeed
            .unwrap_or_else(|| ctx.ahrs.groundspeed())
            .max(0.5 * ctx.config.airspeed_min);
        let yaw_rate_dps = coordinated_turn_yaw_rate_dps(ctx.ahrs.roll_deg(), turn_speed);

        let mut request = None;

        match self.phase {
            TransitionPhase::AirspeedWait => {
                set_spool_state(ctx.motors, DesiredSpoolState::ThrottleUnlimited);

                if self.transition_start_ms == 0 {
                    self.transition_start_ms = now;
                    ctx.telemetry
                        .status(Severity::Info, StatusEvent::TransitionAirspeedWait);
                }

                let timeout_ms = ctx.config.transition_failure_timeout_ms;
                if timeout_ms > 0
                    && now.wrapping_sub(self.transition_start_ms) > timeout_ms
                    && !self.warned_failure
                {
                    self.warned_failure = true;
                    ctx.telemetry
                        .status(Severity::Critical, StatusEvent::TransitionTimeout);
                    if ctx.config.trans_fail_to_cruise
                        && ctx.ahrs.groundspeed() > 0.5 * ctx.config.airspeed_min
                    {
                        // enough groundspeed to trust the wing without an
                        // airspeed reading
                        self.in_forced_transition = true;
                        self.phase = TransitionPhase::Timer;
                    } else {
                        request = Some(match ctx.config.transition_failure_action {
                            TransitionFailureAction::HoverLand => ModeRequest::HoverLand,
                            TransitionFailureAction::HoverRtl => ModeRequest::HoverRtl,
                        });
                    }
                }

                self.low_airspeed_ms = now;

                if let Some(aspeed) = airspeed {
                    if aspeed > ctx.config.airspeed_min && !self.assisted_flight {
                        self.phase = TransitionPhase::Timer;
                        ctx.telemetry.status(
                            Severity::Info,
                            StatusEvent::TransitionAirspeedReached { airspeed_ms: aspeed },
                        );
                    }
                }

                let mut climb_rate = self.assist_climb_rate_ms(
                    now,
                    ctx.nav_pitch_deg,
                    ctx.pilot_throttle,
                    ctx.config,
                );
                if ctx.config.level_transition {
                    climb_rate = climb_rate.min(0.0);
                }
                hold_hover(
                    ctx.attitude,
                    ctx.pos,
                    ctx.config,
                    ctx.nav_roll_deg,
                    ctx.nav_pitch_deg,
                    yaw_rate_dps,
                    climb_rate,
                );

                // rotors dominate; keep the fixed wing rate loops from
                // winding up against them
                ctx.attitude.reset_fw_rate_integrators();
                ctx.attitude.set_throttle_mix_max(1.0);
                self.last_throttle = ctx.motors.throttle();
            }
            TransitionPhase::Timer => {
                set_spool_state(ctx.motors, DesiredSpoolState::ThrottleUnlimited);

                let ramp_ms = constrain_float(ctx.config.transition_time_ms as f32, 500.0, 30_000.0);
                let timer_ms = now.wrapping_sub(self.low_airspeed_ms) as f32;
                if timer_ms > ramp_ms {
                    self.phase = TransitionPhase::Done;
                    self.transition_start_ms = 0;
                    self.low_airspeed_ms = 0;
                    self.in_forced_transition = false;
                    self.warned_failure = false;
                    ctx.telemetry
                        .status(Severity::Info, StatusEvent::TransitionDone);
                } else {
                    let scale = (ramp_ms - timer_ms) / ramp_ms;
                    let throttle = (self.last_throttle * scale).max(TRANSITION_MIN_THROTTLE);
                    self.assisted_flight = true;
                    stabilize_attitude(
                        ctx.attitude,
                        ctx.config,
                        ctx.nav_roll_deg,
                        ctx.nav_pitch_deg,
                        yaw_rate_dps,
                    );
                    ctx.attitude.set_throttle_out(throttle);
                    ctx.attitude.set_throttle_mix_value(0.5 * scale);
                }
            }
            TransitionPhase::Done => {
                set_spool_state(ctx.motors, DesiredSpoolState::ShutDown);
            }
        }

        self.record_fw_pitch(now, ctx.ahrs.pitch_deg());
        request
    }

    fn vtol_update(&mut self, ctx: &mut TransitionCtx<'_, A, AC, PC, M, D, T>) {
        self.transition_start_ms = 0;
        self.low_airspeed_ms = 0;
        self.warned_failure = false;

        if ctx.throttle_wait && !ctx.flying {
            // on the ground: nothing to transition to
            self.in_forced_transition = false;
            self.phase = TransitionPhase::Done;
        } else {
            // pre-arm the next forward transition
            self.phase = TransitionPhase::AirspeedWait;
        }

        self.last_throttle = ctx.motors.throttle();
        self.assisted_flight = false;
        ctx.assist.reset();
    }

    fn force_completion(&mut self, now_ms: u32, pitch_deg: f32, assist: &mut D) {
        self.phase = TransitionPhase::Done;
        self.transition_start_ms = 0;
        self.low_airspeed_ms = 0;
        self.in_forced_transition = false;
        self.warned_failure = false;
        self.assisted_flight = false;
        self.record_fw_pitch(now_ms, pitch_deg);
        assist.reset();
    }

    fn restart(&mut self) {
        SltTransition::restart(self)
    }

    fn complete(&self) -> bool {
        SltTransition::complete(self)
    }

    fn assisted_flight(&self) -> bool {
        self.assisted_flight
    }

    fn active_frwd(&self, in_vtol_airbrake: bool) -> bool {
        self.assisted_flight && self.phase < TransitionPhase::Done && !in_vtol_airbrake
    }

    fn show_vtol_view(&self, in_vtol_mode: bool) -> bool {
        in_vtol_mode
    }

    fn set_fw_roll_pitch(
        &self,
        nav_pitch_deg: &mut f32,
        show_vtol_view: bool,
        in_vtol_airbrake: bool,
        fw_manual_throttle: bool,
        groundspeed_ms: f32,
        config: &Config,
    ) {
        if show_vtol_view || in_vtol_airbrake || fw_manual_throttle || !self.assisted_flight {
            return;
        }
        match self.phase {
            TransitionPhase::AirspeedWait => {
                if groundspeed_ms < AIRSPEED_WAIT_PITCH_GROUNDSPEED_MS {
                    *nav_pitch_deg = 0.0;
                } else {
                    *nav_pitch_deg = constrain_float(
                        *nav_pitch_deg,
                        -config.transition_pitch_max_deg,
                        config.transition_pitch_max_deg,
                    );
                }
            }
            TransitionPhase::Timer => {
                // widened envelope while the rotor throttle ramps out
                let limit = 2.0 * (config.transition_pitch_max_deg + 1.0);
                *nav_pitch_deg = constrain_float(*nav_pitch_deg, -limit, limit);
            }
            TransitionPhase::Done => {}
        }
    }

    fn set_fw_roll_limit(&self, nav_roll_deg: &mut f32, config: &Config) {
        if config.level_transition
            && self.phase < TransitionPhase::Done
            && self.assisted_flight
        {
            *nav_roll_deg = constrain_float(
                *nav_roll_deg,
                -config.level_roll_limit_deg,
                config.level_roll_limit_deg,
            );
        }
    }

    fn allow_update_throttle_mix(&self) -> bool {
        !(self.assisted_flight && self.phase < TransitionPhase::Done)
    }

    fn allow_stick_mixing(&self) -> bool {
        self.phase == TransitionPhase::Done || !self.assisted_flight
    }

    fn set_last_fw_pitch(&mut self, now_ms: u32, pitch_deg: f32) {
        self.record_fw_pitch(now_ms, pitch_deg);
    }

    fn set_vtol_roll_pitch_limit(
        &mut self,
        nav_roll_deg: &mut f32,
        nav_pitch_deg: &mut f32,
        now_ms: u32,
        airspeed: Option<f32>,
        config: &Config,
    ) -> bool {
        let mut limited = false;

        let roll = constrain_float(*nav_roll_deg, -config.angle_max_deg, config.angle_max_deg);
        if roll != *nav_roll_deg {
            *nav_roll_deg = roll;
            limited = true;
        }

        // pitching up past angle_max only makes sense once the control
        // surfaces have lost authority, otherwise elevons act reversed
        let aspeed = airspeed.unwrap_or(0.0);
        let mut upper = linear_interpolate(
            PITCH_UP_ZERO_AIRSPEED_DEG,
            config.angle_max_deg,
            aspeed,
            0.0,
            0.5 * config.airspeed_min,
        );
        let mut lower = -config.angle_max_deg;

        if config.back_trans_pitch_limit_ms > 0 && self.last_fw_mode_ms != 0 {
            let since_fw_ms = now_ms.wrapping_sub(self.last_fw_mode_ms);
            if since_fw_ms < config.back_trans_pitch_limit_ms {
                // envelope expands from the last fixed wing pitch out to the
                // steady state limits over the back transition window
                let t = since_fw_ms as f32;
                let window = config.back_trans_pitch_limit_ms as f32;
                upper = upper.min(linear_interpolate(
                    self.last_fw_pitch_deg.max(0.0),
                    upper,
                    t,
                    0.0,
                    window,
                ));
                lower = lower.max(linear_interpolate(
                    self.last_fw_pitch_deg.min(0.0),
                    lower,
                    t,
                    0.0,
                    window,
                ));
            } else {
                self.last_fw_mode_ms = 0;
            }
        }

        let pitch = constrain_float(*nav_pitch_deg, lower, upper);
        if pitch != *nav_pitch_deg {
            *nav_pitch_deg = pitch;
            limited = true;
        }
        limited
    }

    fn get_mav_vtol_state(&self, in_vtol_mode: bool, in_airbrake_or_pos1: bool) -> MavVtolState {
        if in_vtol_mode {
            if in_airbrake_or_pos1 {
                return MavVtolState::TransitionToMc;
            }
            return MavVtolState::Mc;
        }
        match self.phase {
            TransitionPhase::AirspeedWait | TransitionPhase::Timer => MavVtolState::TransitionToFw,
            TransitionPhase::Done => MavVtolState::Fw,
        }
    }
}
