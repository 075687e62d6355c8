//! Status events and structured log records emitted by the control core.
//!
//! Everything here is advisory. A sink that drops every record must not
//! change control behavior in any way.

use crate::quadplane::poscontrol::LandingPhase;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Human readable status events, one per phase change or failure action.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusEvent {
    TransitionStarted { airspeed_ms: f32 },
    TransitionAirspeedWait,
    TransitionAirspeedReached { airspeed_ms: f32 },
    TransitionDone,
    TransitionTimeout,
    VtolApproach { distance_m: f32 },
    VtolAirbrake { groundspeed_ms: f32, distance_m: f32, stop_distance_m: f32 },
    VtolPosition1 { groundspeed_ms: f32, distance_m: f32 },
    VtolPosition2 { groundspeed_ms: f32, distance_m: f32 },
    VtolOvershoot { distance_m: f32, closing_speed_ms: f32, yaw_error_deg: f32 },
    ThrustLoss { airspeed_ms: f32, threshold_ms: f32 },
    LowAirspeed { airspeed_ms: f32, threshold_ms: f32 },
    LandDescendStarted,
    LandFinalStarted,
    LandComplete,
    TakeoffTimeout,
    TakeoffExcessiveWind { airspeed_ms: f32 },
    /// a phase the state machine considers unreachable was reached and has
    /// been forced to a safe value
    InternalError,
}

/// Position control record, streamed at ~25 Hz while a VTOL maneuver runs and
/// twice on every phase change.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PosControlLog {
    pub phase: LandingPhase,
    pub distance_m: f32,
    pub target_speed_ms: f32,
    pub target_accel_mss: f32,
    pub overshoot: bool,
}

/// Telemetry emission interface. Never gates control flow.
pub trait TelemetrySink {
    fn status(&mut self, severity: Severity, event: StatusEvent);

    fn pos_control_log(&mut self, record: &PosControlLog);
}

/// A sink that discards everything.
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn status(&mut self, _severity: Severity, _event: StatusEvent) {}

    fn pos_control_log(&mut self, _record: &PosControlLog) {}
}

/// MAVLink style VTOL state for telemetry enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MavVtolState {
    Undefined,
    TransitionToFw,
    TransitionToMc,
    Mc,
    Fw,
}
