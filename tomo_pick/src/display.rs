//! Axis-bound helpers for the rendering collaborator. Panels read these
//! and the session; they never own pick state.

use crate::error::{PickError, Result};
use crate::survey::TraceSet;

/// Axis preferences of the rendering layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Fit the amplitude axis to the displayed trace instead of using a
    /// symmetric bound over the whole acquisition.
    pub fit_to_data: bool,
}

/// Bounds for drawing one trace: time axis then amplitude axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBounds {
    pub t_min: f64,
    pub t_max: f64,
    pub a_min: f64,
    pub a_max: f64,
}

/// Computes the axis bounds for trace `index`.
///
/// The time axis always spans the shared sample times. With
/// `fit_to_data` the amplitude axis hugs the trace's own extremes;
/// otherwise it is the symmetric envelope of the whole waveform block,
/// so traces stay comparable while paging through them.
pub fn trace_display_bounds(
    traces: &TraceSet,
    index: usize,
    settings: DisplaySettings,
) -> Result<DisplayBounds> {
    if index >= traces.ntrace() {
        return Err(PickError::validation(format!(
            "trace index {index} out of range for {} traces",
            traces.ntrace()
        )));
    }

    let (t_min, t_max) = extremes(traces.timestp.iter().copied());
    let (a_min, a_max) = if settings.fit_to_data {
        extremes(traces.rdata.column(index).iter().copied())
    } else {
        let envelope = traces
            .rdata
            .iter()
            .fold(0.0f64, |acc, &a| acc.max(a.abs()));
        (-envelope, envelope)
    };

    Ok(DisplayBounds {
        t_min,
        t_max,
        a_min,
        a_max,
    })
}

fn extremes(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}
