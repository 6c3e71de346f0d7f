use super::blend;

/// Exponential smoothing with a fixed retain factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFilter {
    retain: f64,
}

impl ExponentialFilter {
    /// Create a new exponential filter
    ///
    /// # Panics
    ///
    /// Panics if retain is not in the range [0, 1)
    #[must_use]
    pub fn new(retain: f64) -> Self {
        assert!((0.0..1.0).contains(&retain), "Retain must be in [0, 1)");
        Self { retain }
    }

    /// Weight of the previous value
    #[must_use]
    pub const fn retain(&self) -> f64 {
        self.retain
    }

    /// Move `previous` one step toward `raw`
    #[must_use]
    pub fn apply(&self, previous: f64, raw: f64) -> f64 {
        blend(previous, raw, self.retain)
    }
}
