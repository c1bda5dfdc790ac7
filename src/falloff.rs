//! Precomputed radial decay used for every blob-to-cell evaluation.

/// Squared local distance beyond which a blob contributes nothing.
pub const DEFAULT_MAX_DISTANCE_SQ: f32 = 8.0;
/// Exponent applied to the squared distance.
pub const DEFAULT_DECAY: f32 = 1.05;
pub const DEFAULT_TABLE_SIZE: usize = 1024;

const MIN_TABLE_SIZE: usize = 8;

/// Quantized `exp(-decay * d²)` lookup.
///
/// Bucket `i` covers squared distances `[i / scale, (i + 1) / scale)` and holds the
/// weight at the lower edge, so the table never overestimates and never increases.
#[derive(Clone, Debug)]
pub struct FalloffTable {
    weights: Vec<f32>,
    scale: f32,
    max_distance_sq: f32,
}

impl FalloffTable {
    pub fn build(size: usize, max_distance_sq: f32, decay: f32) -> Self {
        let size = size.max(MIN_TABLE_SIZE);
        let max_distance_sq = if max_distance_sq.is_finite() && max_distance_sq > 0.0 {
            max_distance_sq
        } else {
            DEFAULT_MAX_DISTANCE_SQ
        };
        let decay = if decay.is_finite() { decay.max(0.0) } else { DEFAULT_DECAY };
        let scale = (size - 1) as f32 / max_distance_sq;

        let weights = (0..size)
            .map(|i| (-decay * (i as f32 / scale)).exp())
            .collect();

        Self {
            weights,
            scale,
            max_distance_sq,
        }
    }

    /// Default curve with a caller-chosen resolution.
    pub fn with_size(size: usize) -> Self {
        Self::build(size, DEFAULT_MAX_DISTANCE_SQ, DEFAULT_DECAY)
    }

    #[inline]
    pub fn sample(&self, distance_sq: f32) -> f32 {
        if distance_sq.is_nan() || distance_sq >= self.max_distance_sq {
            return 0.0;
        }
        let idx = (distance_sq.max(0.0) * self.scale) as usize;
        self.weights[idx.min(self.weights.len() - 1)]
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn max_distance_sq(&self) -> f32 {
        self.max_distance_sq
    }
}

impl Default for FalloffTable {
    fn default() -> Self {
        Self::with_size(DEFAULT_TABLE_SIZE)
    }
}
