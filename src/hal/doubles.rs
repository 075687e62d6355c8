//! Scripted stand-ins for the hal traits. Tests set the public fields to
//! shape the readings and inspect what the control core commanded.

use super::{Ahrs, AttitudeControl, DesiredSpoolState, Motors, PositionControl};
use crate::telemetry::{PosControlLog, Severity, StatusEvent, TelemetrySink};
use nalgebra::{Vector2, Vector3};
use std::vec::Vec;

pub struct TestAhrs {
    pub airspeed: Option<f32>,
    pub groundspeed_ne: Vector2<f32>,
    pub velocity_ned: Option<Vector3<f32>>,
    pub position_neu_m: Vector3<f32>,
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
    pub height_m: f32,
    pub wind_ne: Vector2<f32>,
    pub accel_ef: Vector3<f32>,
    pub position_reset_ms: u32,
    pub touchdown_expected: bool,
    pub takeoff_expected: bool,
}

impl Default for TestAhrs {
    fn default() -> Self {
        Self {
            airspeed: None,
            groundspeed_ne: Vector2::zeros(),
            velocity_ned: Some(Vector3::zeros()),
            position_neu_m: Vector3::zeros(),
            roll_deg: 0.0,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
            height_m: 50.0,
            wind_ne: Vector2::zeros(),
            accel_ef: Vector3::new(0.0, 0.0, -crate::GRAVITY_MSS),
            position_reset_ms: 0,
            touchdown_expected: false,
            takeoff_expected: false,
        }
    }
}

impl Ahrs for TestAhrs {
    fn airspeed_estimate(&self) -> Option<f32> {
        self.airspeed
    }

    fn groundspeed_vector(&self) -> Vector2<f32> {
        self.groundspeed_ne
    }

    fn velocity_ned(&self) -> Option<Vector3<f32>> {
        self.velocity_ned
    }

    fn position_neu_m(&self) -> Vector3<f32> {
        self.position_neu_m
    }

    fn roll_deg(&self) -> f32 {
        self.roll_deg
    }

    fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }

    fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    fn height_above_ground_m(&self) -> f32 {
        self.height_m
    }

    fn wind_estimate_ne(&self) -> Vector2<f32> {
        self.wind_ne
    }

    fn accel_ef_mss(&self) -> Vector3<f32> {
        self.accel_ef
    }

    fn last_position_reset_ms(&self) -> u32 {
        self.position_reset_ms
    }

    fn set_touchdown_expected(&mut self, expected: bool) {
        self.touchdown_expected = expected;
    }

    fn set_takeoff_expected(&mut self, expected: bool) {
        self.takeoff_expected = expected;
    }
}

#[derive(Default)]
pub struct TestAttitude {
    pub last_roll_deg: f32,
    pub last_pitch_deg: f32,
    pub last_yaw_rate_dps: f32,
    pub last_yaw_deg: Option<f32>,
    /// every direct throttle output, in call order
    pub throttle_out: Vec<f32>,
    pub last_mix: Option<f32>,
    pub mix_min_active: bool,
    pub mix_man_calls: usize,
    pub yaw_resets: Vec<bool>,
    pub fw_integrator_resets: usize,
    pub attitude_target_deg: Vector3<f32>,
    pub attitude_error: f32,
}

impl AttitudeControl for TestAttitude {
    fn input_euler_angle_yaw_rate(&mut self, roll_deg: f32, pitch_deg: f32, yaw_rate_dps: f32) {
        self.last_roll_deg = roll_deg;
        self.last_pitch_deg = pitch_deg;
        self.last_yaw_rate_dps = yaw_rate_dps;
        self.last_yaw_deg = None;
    }

    fn input_euler_angle_yaw_angle(&mut self, roll_deg: f32, pitch_deg: f32, yaw_deg: f32) {
        self.last_roll_deg = roll_deg;
        self.last_pitch_deg = pitch_deg;
        self.last_yaw_deg = Some(yaw_deg);
    }

    fn set_throttle_out(&mut self, throttle: f32) {
        self.throttle_out.push(throttle);
    }

    fn set_throttle_mix_min(&mut self) {
        self.mix_min_active = true;
        self.last_mix = Some(0.0);
    }

    fn set_throttle_mix_man(&mut self) {
        self.mix_min_active = false;
        self.mix_man_calls += 1;
    }

    fn set_throttle_mix_max(&mut self, value: f32) {
        self.mix_min_active = false;
        self.last_mix = Some(value);
    }

    fn set_throttle_mix_value(&mut self, value: f32) {
        self.mix_min_active = false;
        self.last_mix = Some(value);
    }

    fn is_throttle_mix_min(&self) -> bool {
        self.mix_min_active
    }

    fn reset_yaw_target_and_rate(&mut self, reset_rate: bool) {
        self.yaw_resets.push(reset_rate);
    }

    fn reset_fw_rate_integrators(&mut self) {
        self.fw_integrator_resets += 1;
    }

    fn attitude_target_euler_deg(&self) -> Vector3<f32> {
        self.attitude_target_deg
    }

    fn attitude_error_deg(&self) -> f32 {
        self.attitude_error
    }
}

#[derive(Default)]
pub struct TestPos {
    pub last_pos_ne_m: Option<Vector2<f32>>,
    pub last_vel_ne_ms: Option<Vector2<f32>>,
    pub last_accel_ne_mss: Option<Vector2<f32>>,
    pub relax_ne_calls: usize,
    pub init_ne_calls: usize,
    pub active_ne: bool,
    pub update_ne_calls: usize,
    pub fwd_pitch_limited: bool,
    pub externally_limited_calls: usize,
    pub last_desired_accel_ne: Option<Vector2<f32>>,
    pub max_speed_accel_ne: Option<(f32, f32)>,
    pub lean_angle_max_deg: Option<Option<f32>>,
    /// demands the NE controller reports back
    pub roll_out_deg: f32,
    pub pitch_out_deg: f32,
    pub desired_vel_neu_ms: Vector3<f32>,
    pub last_pos_u_m: Option<f32>,
    pub climb_rates: Vec<f32>,
    pub land_rates: Vec<(f32, bool)>,
    pub relax_u_calls: usize,
    pub init_u_calls: usize,
    pub update_u_calls: usize,
    pub vert_integrator_resets: usize,
    pub max_speed_accel_u: Option<(f32, f32, f32)>,
}

impl PositionControl for TestPos {
    fn input_pos_vel_accel_ne(
        &mut self,
        pos_ne_m: Vector2<f32>,
        vel_ne_ms: Vector2<f32>,
        accel_ne_mss: Vector2<f32>,
    ) {
        self.last_pos_ne_m = Some(pos_ne_m);
        self.last_vel_ne_ms = Some(vel_ne_ms);
        self.last_accel_ne_mss = Some(accel_ne_mss);
    }

    fn input_vel_accel_ne(&mut self, vel_ne_ms: Vector2<f32>, accel_ne_mss: Vector2<f32>) {
        self.last_pos_ne_m = None;
        self.last_vel_ne_ms = Some(vel_ne_ms);
        self.last_accel_ne_mss = Some(accel_ne_mss);
    }

    fn relax_velocity_controller_ne(&mut self) {
        self.relax_ne_calls += 1;
    }

    fn init_ne_controller(&mut self) {
        self.init_ne_calls += 1;
        self.active_ne = true;
    }

    fn is_active_ne(&self) -> bool {
        self.active_ne
    }

    fn update_ne_controller(&mut self) {
        self.update_ne_calls += 1;
    }

    fn fwd_pitch_limited(&self) -> bool {
        self.fwd_pitch_limited
    }

    fn set_externally_limited_ne(&mut self) {
        self.externally_limited_calls += 1;
    }

    fn set_accel_desired_ne(&mut self, accel_ne_mss: Vector2<f32>) {
        self.last_desired_accel_ne = Some(accel_ne_mss);
    }

    fn set_max_speed_accel_ne(&mut self, speed_ms: f32, accel_mss: f32) {
        self.max_speed_accel_ne = Some((speed_ms, accel_mss));
    }

    fn set_lean_angle_max_deg(&mut self, angle_deg: Option<f32>) {
        self.lean_angle_max_deg = Some(angle_deg);
    }

    fn roll_deg(&self) -> f32 {
        self.roll_out_deg
    }

    fn pitch_deg(&self) -> f32 {
        self.pitch_out_deg
    }

    fn desired_velocity_neu_ms(&self) -> Vector3<f32> {
        self.desired_vel_neu_ms
    }

    fn input_pos_u_m(&mut self, pos_u_m: f32) {
        self.last_pos_u_m = Some(pos_u_m);
    }

    fn input_climb_rate_ms(&mut self, climb_rate_ms: f32) {
        self.climb_rates.push(climb_rate_ms);
    }

    fn land_at_climb_rate_ms(&mut self, climb_rate_ms: f32, ignore_descent_limit: bool) {
        self.land_rates.push((climb_rate_ms, ignore_descent_limit));
    }

    fn relax_u_controller(&mut self, _throttle: f32) {
        self.relax_u_calls += 1;
    }

    fn init_u_controller(&mut self) {
        self.init_u_calls += 1;
    }

    fn update_u_controller(&mut self) {
        self.update_u_calls += 1;
    }

    fn reset_vertical_accel_integrator(&mut self) {
        self.vert_integrator_resets += 1;
    }

    fn set_max_speed_accel_u(&mut self, speed_down_ms: f32, speed_up_ms: f32, accel_mss: f32) {
        self.max_speed_accel_u = Some((speed_down_ms, speed_up_ms, accel_mss));
    }
}

pub struct TestMotors {
    pub armed: bool,
    pub desired: DesiredSpoolState,
    pub throttle: f32,
    pub hover_throttle: f32,
    pub limit_lower: bool,
    pub zero_demand_calls: usize,
}

impl Default for TestMotors {
    fn default() -> Self {
        Self {
            armed: false,
            desired: DesiredSpoolState::ShutDown,
            throttle: 0.0,
            hover_throttle: 0.35,
            limit_lower: false,
            zero_demand_calls: 0,
        }
    }
}

impl Motors for TestMotors {
    fn armed(&self) -> bool {
        self.armed
    }

    fn set_desired_spool_state(&mut self, state: DesiredSpoolState) {
        self.desired = state;
    }

    fn desired_spool_state(&self) -> DesiredSpoolState {
        self.desired
    }

    fn throttle(&self) -> f32 {
        self.throttle
    }

    fn throttle_hover(&self) -> f32 {
        self.hover_throttle
    }

    fn limit_throttle_lower(&self) -> bool {
        self.limit_lower
    }

    fn zero_demands(&mut self) {
        self.zero_demand_calls += 1;
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Vec<(Severity, StatusEvent)>,
    pub logs: Vec<PosControlLog>,
}

impl RecordingTelemetry {
    pub fn count(&self, event: StatusEvent) -> usize {
        self.events.iter().filter(|(_, e)| *e == event).count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn status(&mut self, severity: Severity, event: StatusEvent) {
        self.events.push((severity, event));
    }

    fn pos_control_log(&mut self, record: &PosControlLog) {
        self.logs.push(*record);
    }
}
