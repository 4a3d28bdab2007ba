//! Result of one ranging loop iteration.

use crate::error::RangerError;
use crate::estimator::EstimateOutcome;
use ranger_traits::RangeReport;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// Report built and accepted by the sink.
    Delivered(RangeReport),
    /// Report built but the sink rejected it; the smoothed value was still updated.
    SendFailed {
        report: RangeReport,
        error: RangerError,
    },
    /// Frame was fine but held no usable target.
    NoDetection(EstimateOutcome),
    /// Frame had the wrong number of samples and was dropped.
    Discarded { expected: usize, actual: usize },
    /// The sensor asked for recalibration; lifecycle re-ran and no frame was estimated.
    Recalibrated,
}

impl FrameStatus {
    pub fn report(&self) -> Option<&RangeReport> {
        match self {
            Self::Delivered(r) | Self::SendFailed { report: r, .. } => Some(r),
            _ => None,
        }
    }
}
