//! # embedded-quadplane
//! A `#![no_std]` control core for VTOL fixed-wing aircraft ("quadplanes") in embedded rust
//!
//! # Components
//! [`QuadPlane`] is the per-tick update driver that owns the two state machines
//! and blends control authority between lift rotors and wing surfaces.
//!
//! [`transition`] contains the forward/backward transition controller that hands
//! over between rotor-borne hover and wing-borne cruise flight
//! (see [`SltTransition`](transition::SltTransition) for separate lift/thrust airframes).
//!
//! [`quadplane::poscontrol`] contains the multi-phase VTOL landing/positioning
//! state machine, and [`approach`] the pure landing approach math it uses.
//!
//! [`assist`] decides when rotor assistance is required during fixed wing flight.
//!
//! [`hal`] contains the hardware abstraction layer for the external attitude,
//! position and motor controllers.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod approach;

pub mod assist;

pub mod config;
pub use config::Config;

pub mod filter;

pub mod hal;

pub mod quadplane;
pub use quadplane::QuadPlane;

pub mod telemetry;

pub mod transition;
pub use transition::{SltTransition, TransitionStrategy};

use embedded_time::{clock, ConversionError};
use num_traits::Float;

/// An error caused by clock timing at the update driver seam
#[derive(Debug)]
pub enum Error {
    Clock(clock::Error),
    Time(ConversionError),
}

impl From<clock::Error> for Error {
    fn from(clock_error: clock::Error) -> Self {
        Error::Clock(clock_error)
    }
}

impl From<ConversionError> for Error {
    fn from(time_error: ConversionError) -> Self {
        Error::Time(time_error)
    }
}

pub const GRAVITY_MSS: f32 = 9.80665;

pub fn constrain_float(amt: f32, low: f32, high: f32) -> f32 {
    if amt.is_nan() {
        return (low + high) / 2.0;
    }

    if amt < low {
        return low;
    }

    if amt > high {
        return high;
    }

    amt
}

pub fn safe_sqrt(v: f32) -> f32 {
    let ret = v.sqrt();
    if ret.is_nan() {
        return 0.0;
    }
    ret
}

pub fn sq(v: f32) -> f32 {
    v * v
}

/// Linear interpolation between `low_output` and `high_output`, with the
/// output constrained to the range as `var` moves outside `[var_low, var_high]`.
pub fn linear_interpolate(
    low_output: f32,
    high_output: f32,
    var_value: f32,
    var_low: f32,
    var_high: f32,
) -> f32 {
    if var_value <= var_low {
        return low_output;
    }
    if var_value >= var_high {
        return high_output;
    }
    let p = (var_value - var_low) / (var_high - var_low);
    low_output + p * (high_output - low_output)
}

/// Wrap an angle in degrees to the range [-180, 180)
pub fn wrap_180(angle_deg: f32) -> f32 {
    let mut res = angle_deg % 360.0;
    if res < -180.0 {
        res += 360.0;
    } else if res >= 180.0 {
        res -= 360.0;
    }
    res
}

/// Heading of a north-east vector in degrees
pub fn heading_deg(v: &nalgebra::Vector2<f32>) -> f32 {
    v.y.atan2(v.x).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::{constrain_float, linear_interpolate, safe_sqrt, wrap_180};

    #[test]
    fn constrain_handles_nan() {
        assert_eq!(constrain_float(f32::NAN, 0.0, 10.0), 5.0);
        assert_eq!(constrain_float(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(constrain_float(11.0, 0.0, 10.0), 10.0);
        assert_eq!(constrain_float(3.0, 0.0, 10.0), 3.0);
    }

    #[test]
    fn sqrt_of_negative_is_zero() {
        assert_eq!(safe_sqrt(-4.0), 0.0);
        assert_eq!(safe_sqrt(4.0), 2.0);
    }

    #[test]
    fn interpolate_clamps_to_range() {
        assert_eq!(linear_interpolate(0.0, 1.0, 5.0, 0.0, 10.0), 0.5);
        assert_eq!(linear_interpolate(0.0, 1.0, -5.0, 0.0, 10.0), 0.0);
        assert_eq!(linear_interpolate(0.0, 1.0, 15.0, 0.0, 10.0), 1.0);
    }

    #[test]
    fn wrap_covers_both_directions() {
        assert_eq!(wrap_180(190.0), -170.0);
        assert_eq!(wrap_180(-190.0), 170.0);
        assert_eq!(wrap_180(45.0), 45.0);
    }
}
