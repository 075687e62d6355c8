//! Decides when the lift rotors should assist fixed wing flight.
//!
//! The transition controller consults [`AssistDecision`] every tick; the
//! verdict is recomputed from scratch each time and only the hysteresis
//! timers persist. [`ThresholdAssist`] is the stock implementation comparing
//! airspeed, height and attitude error against configured thresholds.

use num_traits::Float;

/// Reasons the current assistance verdict is true, for logging.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct AssistFlags {
    bits: u8,
}

impl AssistFlags {
    pub const SPEED: Self = Self { bits: 1 << 0 };
    pub const ALT: Self = Self { bits: 1 << 1 };
    pub const ANGLE: Self = Self { bits: 1 << 2 };
    pub const FORCED: Self = Self { bits: 1 << 3 };
    pub const SPIN_RECOVERY: Self = Self { bits: 1 << 4 };

    pub fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub fn insert(&mut self, other: Self) {
        self.bits |= other.bits;
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn bits(self) -> u8 {
        self.bits
    }
}

/// Per tick readings consumed by the assist decision.
pub struct AssistContext {
    pub now_ms: u32,
    /// armed with rotors commanded beyond ground idle
    pub armed_and_spooled: bool,
    pub height_above_ground_m: f32,
    pub roll_deg: f32,
    pub pitch_deg: f32,
    /// fixed wing envelope the angle trigger compares against
    pub roll_limit_deg: f32,
    pub pitch_limit_max_deg: f32,
    pub pitch_limit_min_deg: f32,
}

pub trait AssistDecision {
    /// True when the rotors should assist. `airspeed` is `None` when no
    /// healthy estimate exists.
    fn should_assist(&mut self, airspeed: Option<f32>, ctx: &AssistContext) -> bool;

    /// Clear accumulated hysteresis state (called when leaving fixed wing
    /// flight so stale triggers do not leak into the next transition).
    fn reset(&mut self);

    fn flags(&self) -> AssistFlags;
}

/// Pilot selectable override of the assistance logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssistOverride {
    Disabled,
    Auto,
    ForceEnabled,
}

/// Threshold based assist decision.
pub struct ThresholdAssist {
    /// airspeed below which assistance is required, ≤ 0 disables assistance
    pub speed_ms: f32,
    /// height below which assistance is required, 0 to disable
    pub alt_m: f32,
    /// attitude error beyond which assistance is required, 0 to disable
    pub angle_deg: f32,
    /// time the altitude or angle trigger must persist (seconds)
    pub delay_s: f32,
    pub over_ride: AssistOverride,
    /// set externally while a spin recovery is active
    pub spin_recovery: bool,

    angle_error_start_ms: u32,
    alt_error_start_ms: u32,
    flags: AssistFlags,
}

// margin beyond the fixed wing envelope before the angle trigger arms
const ANGLE_TRIGGER_MARGIN_DEG: f32 = 5.0;

impl ThresholdAssist {
    pub fn new(speed_ms: f32, alt_m: f32, angle_deg: f32, delay_s: f32) -> Self {
        Self {
            speed_ms,
            alt_m,
            angle_deg,
            delay_s,
            over_ride: AssistOverride::Auto,
            spin_recovery: false,
            angle_error_start_ms: 0,
            alt_error_start_ms: 0,
            flags: AssistFlags::default(),
        }
    }

    fn delay_ms(&self) -> u32 {
        (self.delay_s.max(0.0) * 1000.0) as u32
    }

    fn angle_trigger(&mut self, ctx: &AssistContext) -> bool {
        if self.angle_deg <= 0.0 {
            return false;
        }
        let beyond_envelope = ctx.roll_deg.abs() > ctx.roll_limit_deg + ANGLE_TRIGGER_MARGIN_DEG
            || ctx.pitch_deg > ctx.pitch_limit_max_deg + ANGLE_TRIGGER_MARGIN_DEG
            || ctx.pitch_deg < ctx.pitch_limit_min_deg - ANGLE_TRIGGER_MARGIN_DEG;
        let error_deg = ctx.roll_deg.abs().max(
            (ctx.pitch_deg - ctx.pitch_limit_max_deg).max(ctx.pitch_limit_min_deg - ctx.pitch_deg),
        );
        if !(beyond_envelope && error_deg > self.angle_deg) {
            self.angle_error_start_ms = 0;
            return false;
        }
        if self.angle_error_start_ms == 0 {
            self.angle_error_start_ms = ctx.now_ms;
        }
        ctx.now_ms.wrapping_sub(self.angle_error_start_ms) >= self.delay_ms()
    }

    fn alt_trigger(&mut self, ctx: &AssistContext) -> bool {
        if self.alt_m <= 0.0 || ctx.height_above_ground_m >= self.alt_m {
            self.alt_error_start_ms = 0;
            return false;
        }
        if self.alt_error_start_ms == 0 {
            self.alt_error_start_ms = ctx.now_ms;
        }
        ctx.now_ms.wrapping_sub(self.alt_error_start_ms) >= self.delay_ms()
    }
}

impl AssistDecision for ThresholdAssist {
    fn should_assist(&mut self, airspeed: Option<f32>, ctx: &AssistContext) -> bool {
        if !ctx.armed_and_spooled
            || self.over_ride == AssistOverride::Disabled
            || (self.speed_ms <= 0.0 && self.over_ride != AssistOverride::ForceEnabled)
        {
            self.reset();
            return false;
        }

        let mut flags = AssistFlags::default();

        if self.over_ride == AssistOverride::ForceEnabled {
            flags.insert(AssistFlags::FORCED);
        }

        if let Some(airspeed) = airspeed {
            if self.speed_ms > 0.0 && airspeed < self.speed_ms {
                flags.insert(AssistFlags::SPEED);
            }
        }

        if self.alt_trigger(ctx) {
            flags.insert(AssistFlags::ALT);
        }

        if self.angle_trigger(ctx) {
            flags.insert(AssistFlags::ANGLE);
        }

        if self.spin_recovery {
            flags.insert(AssistFlags::SPIN_RECOVERY);
        }

        self.flags = flags;
        !flags.is_empty()
    }

    fn reset(&mut self) {
        self.angle_error_start_ms = 0;
        self.alt_error_start_ms = 0;
        self.flags = AssistFlags::default();
    }

    fn flags(&self) -> AssistFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::{AssistContext, AssistDecision, AssistFlags, AssistOverride, ThresholdAssist};

    fn ctx(now_ms: u32) -> AssistContext {
        AssistContext {
            now_ms,
            armed_and_spooled: true,
            height_above_ground_m: 50.0,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            roll_limit_deg: 45.0,
            pitch_limit_max_deg: 20.0,
            pitch_limit_min_deg: -25.0,
        }
    }

    #[test]
    fn speed_trigger_is_immediate() {
        let mut assist = ThresholdAssist::new(10.0, 0.0, 0.0, 0.5);
        assert!(assist.should_assist(Some(8.0), &ctx(1000)));
        assert!(assist.flags().contains(AssistFlags::SPEED));
        assert!(!assist.should_assist(Some(12.0), &ctx(1100)));
    }

    #[test]
    fn unknown_airspeed_does_not_speed_trigger() {
        let mut assist = ThresholdAssist::new(10.0, 0.0, 0.0, 0.5);
        assert!(!assist.should_assist(None, &ctx(1000)));
    }

    #[test]
    fn altitude_trigger_requires_sustained_low_height() {
        let mut assist = ThresholdAssist::new(10.0, 20.0, 0.0, 0.5);
        let mut low = ctx(1000);
        low.height_above_ground_m = 10.0;
        assert!(!assist.should_assist(Some(15.0), &low));
        low.now_ms = 1400;
        assert!(!assist.should_assist(Some(15.0), &low));
        low.now_ms = 1600;
        assert!(assist.should_assist(Some(15.0), &low));
        assert!(assist.flags().contains(AssistFlags::ALT));
    }

    #[test]
    fn altitude_trigger_survives_a_timer_wrap() {
        let mut assist = ThresholdAssist::new(10.0, 20.0, 0.0, 0.5);
        let mut low = ctx(u32::MAX - 200);
        low.height_above_ground_m = 10.0;
        assert!(!assist.should_assist(Some(15.0), &low));
        low.now_ms = u32::MAX - 100;
        assert!(!assist.should_assist(Some(15.0), &low));
        low.now_ms = 350;
        assert!(assist.should_assist(Some(15.0), &low));
    }

    #[test]
    fn disabled_when_not_spooled() {
        let mut assist = ThresholdAssist::new(10.0, 0.0, 0.0, 0.5);
        let mut c = ctx(1000);
        c.armed_and_spooled = false;
        assert!(!assist.should_assist(Some(1.0), &c));
        assert!(assist.flags().is_empty());
    }

    #[test]
    fn forced_mode_always_assists() {
        let mut assist = ThresholdAssist::new(0.0, 0.0, 0.0, 0.5);
        assist.over_ride = AssistOverride::ForceEnabled;
        assert!(assist.should_assist(Some(30.0), &ctx(1000)));
        assert!(assist.flags().contains(AssistFlags::FORCED));
    }
}
