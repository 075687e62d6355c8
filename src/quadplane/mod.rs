//! Per tick update driver tying the transition controller, the VTOL
//! position state machine and the authority blending together.
//!
//! [`QuadPlane`] owns its collaborators outright; nothing here is global.
//! Mode changes are never applied internally, they come back to the vehicle
//! mode layer as [`ModeRequest`] data.

use crate::assist::AssistDecision;
use crate::config::Config;
use crate::hal::{Ahrs, AttitudeControl, DesiredSpoolState, Motors, PositionControl};
use crate::telemetry::{MavVtolState, TelemetrySink};
use crate::transition::{SltTransition, TransitionCtx, TransitionStrategy};
use crate::{Error, GRAVITY_MSS};
use embedded_time::duration::Milliseconds;
use embedded_time::Clock;
use nalgebra::{Vector2, Vector3};
use num_traits::Float;

pub mod fwd_throttle;
pub mod poscontrol;
pub mod takeoff;

pub use fwd_throttle::ThrottleBlendState;
pub use poscontrol::{LandingPhase, PosControlState};
pub use takeoff::TakeoffState;

/// Vehicle flight mode, reduced to what the control core must distinguish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightMode {
    /// fixed wing, pilot throttle
    CruiseManual,
    /// fixed wing, autopilot throttle
    Cruise,
    /// rotor borne, pilot throttle
    HoverManual,
    /// rotor borne altitude/position hold
    HoverHold,
    /// autonomous VTOL landing at the current target
    HoverLand,
    /// rotor borne return to home
    HoverRtl,
    /// externally guided VTOL positioning
    Guided,
    /// VTOL segment of an auto mission (takeoff or landing command)
    AutoVtol,
}

impl FlightMode {
    pub fn is_vtol_mode(self) -> bool {
        !matches!(self, FlightMode::CruiseManual | FlightMode::Cruise)
    }

    pub fn is_vtol_man_throttle(self) -> bool {
        matches!(self, FlightMode::HoverManual)
    }

    pub fn fw_manual_throttle(self) -> bool {
        matches!(self, FlightMode::CruiseManual)
    }

    /// Modes the position state machine navigates for.
    pub fn auto_navigation(self) -> bool {
        matches!(
            self,
            FlightMode::HoverLand | FlightMode::HoverRtl | FlightMode::Guided | FlightMode::AutoVtol
        )
    }
}

/// Mode change wanted by the control core, returned as data and applied (or
/// refused) by the vehicle mode layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeRequest {
    /// land vertically at the current position
    HoverLand,
    /// return to home rotor borne
    HoverRtl,
    /// landing finished, motors can be disarmed
    Disarm,
}

/// Pilot stick input, already scaled. `None` at the [`TickInput`] level means
/// no pilot input is available this tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct PilotInput {
    /// roll/pitch sticks in [-1, 1]
    pub roll: f32,
    pub pitch: f32,
    /// commanded yaw rate in deg/s
    pub yaw_rate_dps: f32,
    /// throttle stick in [0, 1]
    pub throttle: f32,
}

/// Everything the update driver consumes for one tick.
#[derive(Clone, Copy, Debug)]
pub struct TickInput {
    pub now_ms: u32,
    pub dt_s: f32,
    pub mode: FlightMode,
    /// fixed wing navigation demands computed by the outer navigation layer
    pub nav_roll_deg: f32,
    pub nav_pitch_deg: f32,
    /// fixed wing throttle demand in percent
    pub fw_throttle_pct: f32,
    /// the fixed wing throttle demand is saturated at its maximum
    pub fw_throttle_saturated: bool,
    /// sink rate in m/s, positive descending
    pub sink_rate_ms: f32,
    /// vehicle level is-flying estimate
    pub flying: bool,
    /// navigation target in NEU meters (landing point, loiter target)
    pub target_neu_m: Option<Vector3<f32>>,
    /// previous waypoint, for descent interpolation along a mission leg
    pub prev_wp_neu_m: Option<Vector3<f32>>,
    pub pilot: Option<PilotInput>,
}

/// Final demands for this tick.
#[derive(Clone, Copy, Debug)]
pub struct Output {
    pub nav_roll_deg: f32,
    pub nav_pitch_deg: f32,
    pub mode_request: Option<ModeRequest>,
}

// Shutdown must zero the demands first so the output stage does not ramp the
// last demand down slowly.
pub(crate) fn set_spool_state<M: Motors>(motors: &mut M, state: DesiredSpoolState) {
    if state == DesiredSpoolState::ShutDown
        && motors.desired_spool_state() != DesiredSpoolState::ShutDown
    {
        motors.zero_demands();
    }
    motors.set_desired_spool_state(state);
}

/// Yaw rate in deg/s for a coordinated turn at the given roll and speed.
pub(crate) fn coordinated_turn_yaw_rate_dps(roll_deg: f32, speed_ms: f32) -> f32 {
    (GRAVITY_MSS * roll_deg.to_radians().tan() / speed_ms.max(1.0)).to_degrees()
}

/// Sample a millisecond timestamp from an `embedded_time` clock.
pub fn now_ms<C: Clock<T = u32>>(clock: &C) -> Result<u32, Error> {
    let instant = clock.try_now()?;
    let ms = Milliseconds::try_from(instant.duration_since_epoch())?;
    Ok(ms.0)
}

// should_relax engages once the motors have been pinned at their lower limit
// for this long
const RELAX_LOWER_LIMIT_MS: u32 = 1000;

/// VTOL transition and landing control core. Owns its collaborators; one
/// instance per vehicle.
pub struct QuadPlane<A, AC, PC, M, D, T, S = SltTransition> {
    pub config: Config,
    pub(crate) ahrs: A,
    pub(crate) attitude: AC,
    pub(crate) pos: PC,
    pub(crate) motors: M,
    pub(crate) assist: D,
    pub(crate) telemetry: T,
    pub(crate) transition: S,
    pub(crate) poscontrol: PosControlState,
    pub(crate) takeoff: TakeoffState,
    pub(crate) blend: ThrottleBlendState,
    /// waiting for pilot throttle before leaving the ground
    pub throttle_wait: bool,
    pub(crate) motors_lower_limit_start_ms: u32,
    /// mode request raised outside the tick (verify calls), drained by update
    pub(crate) pending_request: Option<ModeRequest>,
}

/// The shipped configuration: a separate lift/thrust transition strategy.
pub type SltQuadPlane<A, AC, PC, M, D, T> = QuadPlane<A, AC, PC, M, D, T, SltTransition>;

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
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        ahrs: A,
        attitude: AC,
        pos: PC,
        motors: M,
        assist: D,
        telemetry: T,
        transition: S,
    ) -> Self {
        Self {
            config,
            ahrs,
            attitude,
            pos,
            motors,
            assist,
            telemetry,
            transition,
            poscontrol: PosControlState::default(),
            takeoff: TakeoffState::default(),
            blend: ThrottleBlendState::default(),
            throttle_wait: false,
            motors_lower_limit_start_ms: 0,
            pending_request: None,
        }
    }

    pub fn ahrs(&self) -> &A {
        &self.ahrs
    }

    pub fn ahrs_mut(&mut self) -> &mut A {
        &mut self.ahrs
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn transition(&self) -> &S {
        &self.transition
    }

    pub fn landing_phase(&self) -> LandingPhase {
        self.poscontrol.phase()
    }

    /// One control tick. Runs the assist decision and either the transition
    /// controller (wing borne) or the position machine (rotor borne), then
    /// the authority blending. Demands and mode requests come back as data.
    pub fn update(&mut self, input: &TickInput) -> Output {
        let mut nav_roll_deg = input.nav_roll_deg;
        let mut nav_pitch_deg = input.nav_pitch_deg;
        let mut mode_request = self.pending_request.take();

        self.track_lower_throttle_limit(input.now_ms);

        if input.mode.is_vtol_mode() {
            {
                let mut ctx = TransitionCtx {
                    now_ms: input.now_ms,
                    config: &self.config,
                    nav_roll_deg: input.nav_roll_deg,
                    nav_pitch_deg: input.nav_pitch_deg,
                    pilot_throttle: input.pilot.map(|p| p.throttle).unwrap_or(0.0),
                    flying: input.flying,
                    throttle_wait: self.throttle_wait,
                    ahrs: &self.ahrs,
                    attitude: &mut self.attitude,
                    pos: &mut self.pos,
                    motors: &mut self.motors,
                    assist: &mut self.assist,
                    telemetry: &mut self.telemetry,
                };
                self.transition.vtol_update(&mut ctx);
            }

            if self.takeoff.active {
                self.takeoff_controller(input, &mut nav_roll_deg, &mut nav_pitch_deg);
            } else if input.mode.auto_navigation() {
                let req = self.vtol_position_controller(input, &mut nav_roll_deg, &mut nav_pitch_deg);
                mode_request = mode_request.or(req);
            }
        } else {
            let req = {
                let mut ctx = TransitionCtx {
                    now_ms: input.now_ms,
                    config: &self.config,
                    nav_roll_deg: input.nav_roll_deg,
                    nav_pitch_deg: input.nav_pitch_deg,
                    pilot_throttle: input.pilot.map(|p| p.throttle).unwrap_or(0.0),
                    flying: input.flying,
                    throttle_wait: self.throttle_wait,
                    ahrs: &self.ahrs,
                    attitude: &mut self.attitude,
                    pos: &mut self.pos,
                    motors: &mut self.motors,
                    assist: &mut self.assist,
                    telemetry: &mut self.telemetry,
                };
                self.transition.update(&mut ctx)
            };
            if let Some(req) = req {
                if req == ModeRequest::HoverRtl {
                    // the hover return entry expects the position machine to
                    // already be braking
                    self.set_phase(LandingPhase::Position1, input.now_ms);
                }
                mode_request = mode_request.or(Some(req));
            }

            let show_vtol = self.transition.show_vtol_view(false);
            let airbrake = self.in_vtol_airbrake();
            self.transition.set_fw_roll_pitch(
                &mut nav_pitch_deg,
                show_vtol,
                airbrake,
                input.mode.fw_manual_throttle(),
                self.ahrs.groundspeed(),
                &self.config,
            );
            self.transition.set_fw_roll_limit(&mut nav_roll_deg, &self.config);
        }

        self.update_throttle_mix(input);

        Output {
            nav_roll_deg,
            nav_pitch_deg,
            mode_request,
        }
    }

    /// As [`update`](Self::update), with `now_ms` sampled from a clock.
    pub fn update_from_clock<C: Clock<T = u32>>(
        &mut self,
        clock: &C,
        input: &TickInput,
    ) -> Result<Output, Error> {
        let mut input = *input;
        input.now_ms = now_ms(clock)?;
        Ok(self.update(&input))
    }

    /// Called by the mode layer on every mode change, before the first tick
    /// of the new mode.
    pub fn mode_enter(&mut self, now_ms: u32) {
        self.poscontrol.correction_ne_m = Vector2::zeros();
        self.poscontrol.velocity_match_ne_ms = Vector2::zeros();
        self.poscontrol.last_velocity_match_ms = 0;
        self.set_phase(LandingPhase::None, now_ms);
        self.poscontrol.pilot_correction_active = false;
        self.poscontrol.pilot_correction_done = false;
        self.poscontrol.landing_sequence = false;
        self.takeoff.active = false;
        self.pos.set_lean_angle_max_deg(None);
        self.blend.reset();
    }

    /// Velocity of a moving landing target, matched while fresh.
    pub fn set_landing_velocity(&mut self, now_ms: u32, velocity_ne_ms: Vector2<f32>) {
        self.poscontrol.velocity_match_ne_ms = velocity_ne_ms;
        self.poscontrol.last_velocity_match_ms = now_ms;
    }

    /// Snap the transition to complete (entering a fixed wing mode at speed).
    pub fn force_transition_complete(&mut self, now_ms: u32) {
        let pitch = self.ahrs.pitch_deg();
        self.transition.force_completion(now_ms, pitch, &mut self.assist);
    }

    pub fn get_mav_vtol_state(&self, mode: FlightMode) -> MavVtolState {
        let in_airbrake_or_pos1 = matches!(
            self.poscontrol.phase(),
            LandingPhase::Airbrake | LandingPhase::Position1
        );
        self.transition
            .get_mav_vtol_state(mode.is_vtol_mode(), in_airbrake_or_pos1)
    }

    pub fn in_vtol_airbrake(&self) -> bool {
        self.poscontrol.phase() == LandingPhase::Airbrake
    }

    /// Fixed wing approach portion of a VTOL landing.
    pub fn in_vtol_land_approach(&self) -> bool {
        self.poscontrol.landing_sequence
            && matches!(
                self.poscontrol.phase(),
                LandingPhase::Approach
                    | LandingPhase::Airbrake
                    | LandingPhase::Position1
                    | LandingPhase::Position2
            )
    }

    pub fn in_vtol_land_descent(&self) -> bool {
        self.poscontrol.landing_sequence
            && matches!(
                self.poscontrol.phase(),
                LandingPhase::LandDescend | LandingPhase::LandFinal
            )
    }

    pub fn in_vtol_land_final(&self) -> bool {
        self.poscontrol.landing_sequence && self.poscontrol.phase() == LandingPhase::LandFinal
    }

    pub fn in_vtol_land_sequence(&self) -> bool {
        self.poscontrol.landing_sequence && self.poscontrol.phase() != LandingPhase::None
    }

    fn track_lower_throttle_limit(&mut self, now_ms: u32) {
        let mut at_lower_limit =
            self.motors.limit_throttle_lower() && self.attitude.is_throttle_mix_min();
        if self.motors.throttle() < 0.01 {
            at_lower_limit = true;
        }
        if !at_lower_limit {
            self.motors_lower_limit_start_ms = 0;
        } else if self.motors_lower_limit_start_ms == 0 {
            self.motors_lower_limit_start_ms = now_ms;
        }
    }

    /// True when attitude control should be relaxed: the motors have been
    /// pinned at their lower limit long enough that we are probably on the
    /// ground.
    pub(crate) fn should_relax(&self, now_ms: u32) -> bool {
        self.motors_lower_limit_start_ms != 0
            && now_ms.wrapping_sub(self.motors_lower_limit_start_ms) > RELAX_LOWER_LIMIT_MS
    }
}
