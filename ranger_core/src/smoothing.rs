//! Fixed-capacity smoothing window over delivered distances.

use crate::config::{SmoothingCfg, SmoothingMode};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    values: VecDeque<f32>,
    capacity: usize,
    mode: SmoothingMode,
}

impl SmoothingBuffer {
    /// Capacity is raised to 1 if zero.
    pub fn new(cfg: &SmoothingCfg) -> Self {
        let capacity = cfg.window.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            mode: cfg.mode,
        }
    }

    /// Insert `value`, evicting the oldest entry when full, and return the new aggregate.
    pub fn push(&mut self, value: f32) -> f32 {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.aggregate().unwrap_or(value)
    }

    /// Current aggregate; `None` while empty.
    pub fn aggregate(&self) -> Option<f32> {
        let latest = *self.values.back()?;
        let n = self.values.len() as f32;
        let mean = || self.values.iter().sum::<f32>() / n;
        let out = match self.mode {
            SmoothingMode::Passthrough => latest,
            SmoothingMode::Average => mean(),
            SmoothingMode::Weighted { factor, start } => {
                let (num, den) = self
                    .values
                    .iter()
                    .enumerate()
                    .fold((0.0f32, 0.0f32), |(num, den), (k, &v)| {
                        let w = start + k as f32 * factor;
                        (num + w * v, den + w)
                    });
                if den > 0.0 && den.is_finite() {
                    num / den
                } else {
                    mean()
                }
            }
        };
        Some(out)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
