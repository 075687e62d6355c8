//! Pure landing approach math: stopping distances, closing velocity profiles
//! and descent rate shaping. Stateless; every function is a plain map from
//! inputs to outputs so the state machines above stay testable.

use crate::{linear_interpolate, safe_sqrt, sq};
use num_traits::Float;

/// Stopping distance in meters from `v^2/(2*decel)`.
///
/// Only approximate in practice as drag varies with pitch, but it gives the
/// operator a single deceleration knob for the transition distance.
pub fn stopping_distance_m(ground_speed_squared: f32, decel_mss: f32) -> f32 {
    ground_speed_squared / (2.0 * decel_mss)
}

/// Acceleration in m/s/s needed to stop within `stop_distance_m`.
pub fn accel_needed_mss(stop_distance_m: f32, ground_speed_squared: f32) -> f32 {
    ground_speed_squared / (2.0 * stop_distance_m.max(1.0))
}

/// Distance below which a landing skips the fixed wing approach, based on the
/// stopping distance at cruise speed.
pub fn transition_threshold_m(cruise_speed_ms: f32, decel_mss: f32) -> f32 {
    1.5 * stopping_distance_m(sq(cruise_speed_ms), decel_mss)
}

/// Desired closing speed toward the landing point: the speed from which a
/// constant `decel_mss` stop just reaches the target, capped at
/// `ceiling_ms` (airspeed derived). Zero inside one meter.
pub fn desired_closing_speed_ms(distance_m: f32, decel_mss: f32, ceiling_ms: f32) -> f32 {
    if distance_m < 1.0 {
        return 0.0;
    }
    safe_sqrt(2.0 * decel_mss * distance_m).min(ceiling_ms)
}

/// Limit VTOL navigation speed when pointing away from the target; quadplanes
/// are often unstable flying sideways or backwards. Full speed within 20
/// degrees, a 2x reduction at 90 and 3x at 160 degrees off.
pub fn scaled_wp_speed_ms(yaw_error_deg: f32, wp_speed_ms: f32) -> f32 {
    let yaw_error = yaw_error_deg.abs();
    if yaw_error > 20.0 {
        let speed_reduction = linear_interpolate(1.0, 3.0, yaw_error, 20.0, 160.0);
        return wp_speed_ms / speed_reduction;
    }
    wp_speed_ms
}

/// Height window above `land_final_alt_m` over which the descent rate blends
/// from the cruise descent speed down to the final landing speed.
pub const DESCENT_BLEND_WINDOW_M: f32 = 6.0;

/// Smooth descent rate profile for landing, removing the discontinuity at the
/// final approach altitude.
pub fn landing_descent_rate_ms(
    height_above_ground_m: f32,
    land_final_speed_ms: f32,
    wp_speed_down_ms: f32,
    land_final_alt_m: f32,
) -> f32 {
    linear_interpolate(
        land_final_speed_ms,
        wp_speed_down_ms,
        height_above_ground_m,
        land_final_alt_m,
        land_final_alt_m + DESCENT_BLEND_WINDOW_M,
    )
}

/// Maximum change between two height readings for the ground proximity
/// trigger; a single outlier reading (rangefinder glitch) is rejected.
pub const FINAL_TRIGGER_MAX_CHANGE_M: f32 = 5.0;

/// Ground proximity trigger for the switch to the final landing phase: two
/// consecutive readings below the final altitude and within the glitch bound
/// of each other.
pub fn land_final_trigger(
    height_above_ground_m: f32,
    last_height_above_ground_m: f32,
    land_final_alt_m: f32,
) -> bool {
    height_above_ground_m < land_final_alt_m
        && (height_above_ground_m - last_height_above_ground_m).abs() < FINAL_TRIGGER_MAX_CHANGE_M
}

/// Time budget for a VTOL climb in ms, from the two phase climb profile
/// `t_accel = (v_max - v_z)/a`, `d_accel = v_z*t + a*t^2/2`,
/// `t_const = (d_total - d_accel)/v_max`, scaled by `failure_scalar` with a
/// five second floor.
pub fn takeoff_time_budget_ms(
    climb_m: f32,
    accel_mss: f32,
    vel_max_ms: f32,
    vel_u_ms: f32,
    failure_scalar: f32,
) -> u32 {
    let accel = accel_mss.max(0.1);
    let vel_max = vel_max_ms.max(0.1);
    let t_accel_s = (vel_max - vel_u_ms) / accel;
    let d_accel_m = vel_u_ms * t_accel_s + 0.5 * accel * sq(t_accel_s);
    let d_remaining_m = climb_m - d_accel_m;
    let t_constant_s = d_remaining_m / vel_max;
    let travel_time_s = t_accel_s.max(0.0) + t_constant_s.max(0.0);
    (travel_time_s * failure_scalar * 1000.0).max(5000.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stopping_distance_matches_kinematics() {
        // closing speed 10 m/s at 2 m/s/s deceleration stops in 25 m
        assert_relative_eq!(stopping_distance_m(sq(10.0), 2.0), 25.0);
        assert_eq!(stopping_distance_m(0.0, 2.0), 0.0);
        // stateless: repeated calls agree
        assert_eq!(
            stopping_distance_m(sq(10.0), 2.0),
            stopping_distance_m(sq(10.0), 2.0)
        );
    }

    #[test]
    fn accel_needed_floors_distance_at_one_meter() {
        assert_relative_eq!(accel_needed_mss(25.0, sq(10.0)), 2.0);
        assert_relative_eq!(accel_needed_mss(0.5, sq(2.0)), 2.0);
    }

    #[test]
    fn closing_speed_capped_and_zero_close_in() {
        assert_relative_eq!(desired_closing_speed_ms(25.0, 2.0, 100.0), 10.0);
        assert_relative_eq!(desired_closing_speed_ms(1000.0, 2.0, 15.0), 15.0);
        assert_eq!(desired_closing_speed_ms(0.5, 2.0, 15.0), 0.0);
    }

    #[test]
    fn wp_speed_scaling_by_yaw_error() {
        assert_relative_eq!(scaled_wp_speed_ms(10.0, 6.0), 6.0);
        assert_relative_eq!(scaled_wp_speed_ms(90.0, 6.0), 3.0);
        assert_relative_eq!(scaled_wp_speed_ms(-90.0, 6.0), 3.0);
        assert_relative_eq!(scaled_wp_speed_ms(160.0, 6.0), 2.0);
    }

    #[test]
    fn descent_rate_blends_without_discontinuity() {
        let rate_high = landing_descent_rate_ms(12.1, 0.5, 1.5, 6.0);
        let rate_at_window = landing_descent_rate_ms(12.0, 0.5, 1.5, 6.0);
        let rate_mid = landing_descent_rate_ms(9.0, 0.5, 1.5, 6.0);
        let rate_final = landing_descent_rate_ms(6.0, 0.5, 1.5, 6.0);
        assert_relative_eq!(rate_high, 1.5);
        assert_relative_eq!(rate_at_window, 1.5);
        assert_relative_eq!(rate_mid, 1.0);
        assert_relative_eq!(rate_final, 0.5);
        // below the final altitude the rate stays at the final speed
        assert_relative_eq!(landing_descent_rate_ms(1.0, 0.5, 1.5, 6.0), 0.5);
    }

    #[test]
    fn final_trigger_rejects_single_outlier() {
        // previous reading 3 m, glitch reading 50 m: no trigger
        assert!(!land_final_trigger(50.0, 3.0, 6.0));
        // consistent low readings trigger
        assert!(land_final_trigger(3.0, 3.2, 6.0));
        // low reading right after a glitch is also rejected
        assert!(!land_final_trigger(3.0, 50.0, 6.0));
    }

    #[test]
    fn takeoff_budget_has_floor() {
        assert_eq!(takeoff_time_budget_ms(1.0, 2.5, 2.5, 0.0, 1.0), 5000);
        let budget = takeoff_time_budget_ms(100.0, 2.5, 2.5, 0.0, 2.0);
        // 0.5s to accelerate (0.625 m), then ~39.75 s at 2.5 m/s, doubled
        assert!(budget > 80000 && budget < 82000);
    }
}
