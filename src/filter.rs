//! First order low pass filters for scalar and vector samples.

use core::f32::consts::PI;
use nalgebra::Vector3;

fn alpha(dt: f32, cutoff_freq: f32) -> f32 {
    if cutoff_freq <= 0.0 || dt <= 0.0 {
        return 1.0;
    }
    let rc = 1.0 / (2.0 * PI * cutoff_freq);
    crate::constrain_float(dt / (dt + rc), 0.0, 1.0)
}

pub struct LowPassFilter {
    cutoff_freq: f32,
    output: f32,
    is_initialised: bool,
}

impl LowPassFilter {
    pub fn with_cutoff(cutoff_freq: f32) -> Self {
        Self {
            cutoff_freq,
            output: 0.0,
            is_initialised: false,
        }
    }

    pub fn apply(&mut self, sample: f32, dt: f32) -> f32 {
        if !self.is_initialised {
            self.is_initialised = true;
            self.output = sample;
            return self.output;
        }
        let alpha = alpha(dt, self.cutoff_freq);
        self.output += (sample - self.output) * alpha;
        self.output
    }

    /// Apply with an explicit first order time constant instead of a cutoff
    /// frequency, `alpha = dt / (dt + tconst)`.
    pub fn apply_tconst(&mut self, sample: f32, tconst: f32, dt: f32) -> f32 {
        if !self.is_initialised {
            self.is_initialised = true;
            self.output = sample;
            return self.output;
        }
        if dt > 0.0 {
            let coef = dt / (dt + tconst);
            self.output += (sample - self.output) * coef;
        }
        self.output
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn reset(&mut self, value: f32) {
        self.is_initialised = true;
        self.output = value;
    }
}

pub struct LowPassFilterVector3 {
    cutoff_freq: f32,
    output: Vector3<f32>,
    is_initialised: bool,
}

impl LowPassFilterVector3 {
    pub fn with_cutoff(cutoff_freq: f32) -> Self {
        Self {
            cutoff_freq,
            output: Vector3::zeros(),
            is_initialised: false,
        }
    }

    pub fn apply(&mut self, sample: Vector3<f32>, dt: f32) -> Vector3<f32> {
        if !self.is_initialised {
            self.is_initialised = true;
            self.output = sample;
            return self.output;
        }
        let alpha = alpha(dt, self.cutoff_freq);
        self.output += (sample - self.output) * alpha;
        self.output
    }

    pub fn output(&self) -> Vector3<f32> {
        self.output
    }

    pub fn reset(&mut self, value: Vector3<f32>) {
        self.is_initialised = true;
        self.output = value;
    }
}

#[cfg(test)]
mod tests {
    use super::LowPassFilter;
    use approx::assert_relative_eq;
    use num_traits::Float;

    #[test]
    fn first_sample_initialises_output() {
        let mut filter = LowPassFilter::with_cutoff(1.0);
        assert_eq!(filter.apply(5.0, 0.01), 5.0);
    }

    #[test]
    fn tconst_form_converges() {
        let mut filter = LowPassFilter::with_cutoff(0.0);
        filter.reset(0.0);
        // a 0.5s time constant reaches ~63% of the step after 0.5s
        let mut out = 0.0;
        for _ in 0..50 {
            out = filter.apply_tconst(1.0, 0.5, 0.01);
        }
        assert_relative_eq!(out, 1.0 - (-1.0f32).exp(), epsilon = 0.02);
    }
}
