use rand::Rng;

/// Probabilistic admission filter.
///
/// One uniform draw in `[0, 1)` per inbound call; a call is admitted when
/// the draw lands strictly below the configured rate, so rate 0 admits
/// nothing and rate 1 admits everything. The rate is clamped to `[0, 1]` at
/// construction and a NaN override resolves to 0, turning sampling off.
#[derive(Debug, Clone, Copy)]
pub struct SamplingGate {
    rate: f64,
}

impl SamplingGate {
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn admit(&self) -> bool {
        self.decide(rand::rng().random::<f64>())
    }

    fn decide(&self, draw: f64) -> bool {
        draw < self.rate
    }
}
