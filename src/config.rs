//! Named configuration for the quadplane control core.
//!
//! Defaults match the stock firmware parameter values. A zero value disables a
//! feature wherever the field documents it.

use num_traits::Float;

/// Recovery action taken when the forward transition exceeds its time limit
/// and a forced completion is not permitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionFailureAction {
    /// switch to a rotor-borne landing at the current position
    HoverLand,
    /// switch to a rotor-borne return-to-home
    HoverRtl,
}

pub struct Config {
    /// maximum lean angle in VTOL flight (degrees)
    pub angle_max_deg: f32,
    /// maximum pitch during the airspeed wait stage of a forward transition (degrees)
    pub transition_pitch_max_deg: f32,
    /// roll limit applied when the level-transition option is set (degrees)
    pub level_roll_limit_deg: f32,

    /// minimum fixed wing airspeed (m/s)
    pub airspeed_min: f32,
    /// maximum fixed wing airspeed (m/s)
    pub airspeed_max: f32,
    /// cruise airspeed (m/s)
    pub airspeed_cruise: f32,
    /// fixed wing pitch limits (degrees)
    pub pitch_limit_max_deg: f32,
    pub pitch_limit_min_deg: f32,
    /// fixed wing roll limit (degrees)
    pub roll_limit_deg: f32,
    /// fixed wing throttle range (percent)
    pub throttle_min_pct: f32,
    pub throttle_max_pct: f32,
    pub throttle_cruise_pct: f32,

    /// duration of the throttle ramp after reaching transition airspeed (ms)
    pub transition_time_ms: u32,
    /// deceleration used for transition and landing approach planning (m/s/s)
    pub transition_decel_mss: f32,
    /// forward transition time limit, zero to disable (ms)
    pub transition_failure_timeout_ms: u32,
    pub transition_failure_action: TransitionFailureAction,
    /// duration of the expanding pitch envelope after a back transition,
    /// zero to disable (ms)
    pub back_trans_pitch_limit_ms: u32,

    /// gain from forward tilt demand to forward throttle, zero disables the
    /// forward thrust motor mapping
    pub fwd_thr_gain: f32,
    /// forward pitch-down limit when the forward motor is healthy (degrees)
    pub fwd_pitch_lim_deg: f32,
    /// pitch-up limit when braking at high speed, airspeed scaled (degrees)
    pub bck_pitch_lim_deg: f32,
    /// gain for the legacy forward velocity-error throttle integrator,
    /// zero disables it
    pub vel_forward_gain: f32,
    /// height below which forward throttle scales to zero (m)
    pub vel_forward_alt_cutoff_m: f32,

    /// maximum horizontal speed in VTOL navigation (m/s)
    pub wp_speed_ms: f32,
    /// horizontal acceleration in VTOL navigation (m/s/s)
    pub wp_accel_mss: f32,
    /// default climb and descent speeds in VTOL navigation (m/s)
    pub wp_speed_up_ms: f32,
    pub wp_speed_down_ms: f32,
    /// pilot vertical speed and acceleration limits
    pub pilot_speed_z_max_up_ms: f32,
    /// zero means use the climb limit for descent as well
    pub pilot_speed_z_max_dn_ms: f32,
    pub pilot_accel_z_mss: f32,

    /// altitude at which the final landing descent begins (m)
    pub land_final_alt_m: f32,
    /// descent rate during final landing (m/s)
    pub land_final_speed_ms: f32,
    /// maximum altitude change tolerated by the landing detector (m)
    pub land_detect_alt_change_m: f32,
    /// distance below which a landing skips the fixed wing approach,
    /// zero to use the stopping-distance heuristic (m)
    pub approach_distance_m: f32,
    /// fixed wing landing approach airspeed, `None` to use the
    /// min/cruise midpoint (m/s)
    pub land_airspeed_ms: Option<f32>,

    /// scales the computed takeoff time budget, zero disables the timeout
    pub takeoff_failure_scalar: f32,
    /// airspeed during VTOL takeoff above which the takeoff is aborted,
    /// zero to disable (m/s)
    pub maximum_takeoff_airspeed_ms: f32,
    /// height gain below which takeoff does no horizontal navigation (m)
    pub takeoff_navalt_min_m: f32,

    /// keep transitions level rather than allowing a climb
    pub level_transition: bool,
    /// on transition failure, complete the transition anyway when groundspeed
    /// supports it
    pub trans_fail_to_cruise: bool,
    /// allow pilot throttle to vary the landing descent rate
    pub throttle_landing_control: bool,
    /// allow pilot repositioning during a VTOL landing
    pub reposition_landing: bool,
    /// never use a fixed wing approach for VTOL landings
    pub disable_approach: bool,
    /// disable ground effect compensation hints to the estimator
    pub disable_ground_effect_comp: bool,
    /// continue the mission after a VTOL landing instead of disarming
    pub continue_after_land: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            angle_max_deg: 30.0,
            transition_pitch_max_deg: 3.0,
            level_roll_limit_deg: 5.0,
            airspeed_min: 9.0,
            airspeed_max: 22.0,
            airspeed_cruise: 12.0,
            pitch_limit_max_deg: 20.0,
            pitch_limit_min_deg: -25.0,
            roll_limit_deg: 45.0,
            throttle_min_pct: 0.0,
            throttle_max_pct: 75.0,
            throttle_cruise_pct: 45.0,
            transition_time_ms: 5000,
            transition_decel_mss: 2.0,
            transition_failure_timeout_ms: 0,
            transition_failure_action: TransitionFailureAction::HoverLand,
            back_trans_pitch_limit_ms: 3000,
            fwd_thr_gain: 2.0,
            fwd_pitch_lim_deg: 3.0,
            bck_pitch_lim_deg: 10.0,
            vel_forward_gain: 0.0,
            vel_forward_alt_cutoff_m: 0.0,
            wp_speed_ms: 5.0,
            wp_accel_mss: 2.5,
            wp_speed_up_ms: 2.5,
            wp_speed_down_ms: 1.5,
            pilot_speed_z_max_up_ms: 2.5,
            pilot_speed_z_max_dn_ms: 0.0,
            pilot_accel_z_mss: 2.5,
            land_final_alt_m: 6.0,
            land_final_speed_ms: 0.5,
            land_detect_alt_change_m: 0.2,
            approach_distance_m: 0.0,
            land_airspeed_ms: None,
            takeoff_failure_scalar: 0.0,
            maximum_takeoff_airspeed_ms: 0.0,
            takeoff_navalt_min_m: 0.0,
            level_transition: false,
            trans_fail_to_cruise: false,
            throttle_landing_control: false,
            reposition_landing: false,
            disable_approach: false,
            disable_ground_effect_comp: false,
            continue_after_land: false,
        }
    }
}

impl Config {
    /// Descent speed limit, falling back to the climb limit when unset.
    pub fn pilot_velocity_z_max_dn_ms(&self) -> f32 {
        if self.pilot_speed_z_max_dn_ms == 0.0 {
            self.pilot_speed_z_max_up_ms.abs()
        } else {
            self.pilot_speed_z_max_dn_ms.abs()
        }
    }
}
