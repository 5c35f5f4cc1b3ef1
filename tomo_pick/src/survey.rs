//! Survey data model: mogs, air shots and their per-trace pick annotations.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};
use crate::geometry::Point3;

/// Sentinel stored in `tt`/`et` while a trace has no pick. Never a valid
/// time: consumers must test against it before using either array.
pub const UNPICKED: f64 = -1.0;

/// Review flag of a single trace.
///
/// Saved files keep the historical integer encoding (0 never reviewed,
/// 1 reviewed, -1 reset), so the three states survive a round trip and
/// downstream consumers can tell a reset trace from one never looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum ReviewState {
    #[default]
    NotReviewed,
    Reviewed,
    Reset,
}

impl ReviewState {
    /// True for the states the review queue still has to visit.
    pub fn is_pending(self) -> bool {
        !matches!(self, ReviewState::Reviewed)
    }
}

impl From<ReviewState> for i8 {
    fn from(state: ReviewState) -> i8 {
        match state {
            ReviewState::NotReviewed => 0,
            ReviewState::Reviewed => 1,
            ReviewState::Reset => -1,
        }
    }
}

impl TryFrom<i8> for ReviewState {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, String> {
        match value {
            0 => Ok(ReviewState::NotReviewed),
            1 => Ok(ReviewState::Reviewed),
            -1 => Ok(ReviewState::Reset),
            other => Err(format!("invalid review flag {other}")),
        }
    }
}

/// One acquisition: per-trace geometry, the waveform block and the pick
/// annotation arrays. Shared by [`Mog`] and [`AirShot`].
///
/// All per-trace sequences are index-aligned; trace `i` of `rdata` is
/// column `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSet {
    pub name: String,
    /// Transmitter position per trace.
    pub tx: Vec<Point3>,
    /// Receiver position per trace.
    pub rx: Vec<Point3>,
    /// Amplitude block, samples-per-trace rows by ntrace columns.
    pub rdata: Array2<f64>,
    /// Sample times shared by every trace.
    pub timestp: Vec<f64>,
    pub tunits: String,
    pub cunits: String,
    /// Picked travel time per trace, [`UNPICKED`] while unset.
    pub tt: Vec<f64>,
    /// Picked uncertainty half-width per trace, [`UNPICKED`] while unset.
    pub et: Vec<f64>,
    /// Review flag per trace.
    pub tt_done: Vec<ReviewState>,
    /// Inclusion mask for statistics; excluded traces keep their picks.
    pub in_vect: Vec<bool>,
}

/// Summary of the annotation progress of one [`TraceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PickCounts {
    pub ntrace: usize,
    /// Traces with a committed travel time.
    pub picked: usize,
    /// Traces flagged reviewed.
    pub reviewed: usize,
    /// Traces still waiting for review (never reviewed or reset).
    pub pending: usize,
    /// Traces masked out of statistics.
    pub excluded: usize,
}

impl TraceSet {
    /// Creates an acquisition with empty annotations for every trace.
    pub fn new(
        name: impl Into<String>,
        tx: Vec<Point3>,
        rx: Vec<Point3>,
        rdata: Array2<f64>,
        timestp: Vec<f64>,
        tunits: impl Into<String>,
        cunits: impl Into<String>,
    ) -> Self {
        let ntrace = tx.len();
        Self {
            name: name.into(),
            tx,
            rx,
            rdata,
            timestp,
            tunits: tunits.into(),
            cunits: cunits.into(),
            tt: vec![UNPICKED; ntrace],
            et: vec![UNPICKED; ntrace],
            tt_done: vec![ReviewState::NotReviewed; ntrace],
            in_vect: vec![true; ntrace],
        }
    }

    /// Number of traces in the acquisition.
    pub fn ntrace(&self) -> usize {
        self.tx.len()
    }

    /// Checks the structural invariants: every per-trace array has the
    /// same length and the waveform block matches both axes.
    pub fn validate(&self) -> Result<()> {
        let n = self.ntrace();
        let aligned = [
            self.rx.len(),
            self.tt.len(),
            self.et.len(),
            self.tt_done.len(),
            self.in_vect.len(),
        ];
        if aligned.iter().any(|&len| len != n) {
            return Err(PickError::validation(format!(
                "{}: per-trace arrays disagree on ntrace {n}",
                self.name
            )));
        }
        if self.rdata.ncols() != n {
            return Err(PickError::validation(format!(
                "{}: waveform block has {} columns for {n} traces",
                self.name,
                self.rdata.ncols()
            )));
        }
        if self.rdata.nrows() != self.timestp.len() {
            return Err(PickError::validation(format!(
                "{}: waveform block has {} samples but timestp has {}",
                self.name,
                self.rdata.nrows(),
                self.timestp.len()
            )));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.ntrace() {
            Err(PickError::validation(format!(
                "trace index {index} out of range for {} traces",
                self.ntrace()
            )))
        } else {
            Ok(())
        }
    }

    /// Commits a travel-time pick and flags the trace reviewed.
    pub fn set_pick(&mut self, index: usize, time: f64) -> Result<()> {
        self.check_index(index)?;
        if !time.is_finite() {
            return Err(PickError::validation(format!(
                "pick time {time} is not finite"
            )));
        }
        if time == UNPICKED {
            return Err(PickError::validation(
                "pick time collides with the unpicked sentinel",
            ));
        }
        self.tt[index] = time;
        self.tt_done[index] = ReviewState::Reviewed;
        Ok(())
    }

    /// Sets the uncertainty half-width. The review flag is left alone.
    pub fn set_uncertainty(&mut self, index: usize, half_width: f64) -> Result<()> {
        self.check_index(index)?;
        if !half_width.is_finite() || half_width < 0.0 {
            return Err(PickError::validation(format!(
                "uncertainty {half_width} must be finite and non-negative"
            )));
        }
        self.et[index] = half_width;
        Ok(())
    }

    /// Clears the pick on a trace and marks it reset, which re-enters it
    /// into the review queue while staying distinguishable from a trace
    /// that was never touched.
    pub fn reset_pick(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.tt[index] = UNPICKED;
        self.et[index] = UNPICKED;
        self.tt_done[index] = ReviewState::Reset;
        Ok(())
    }

    /// True when the trace carries a committed travel time.
    pub fn is_picked(&self, index: usize) -> bool {
        self.tt[index] != UNPICKED
    }

    /// Smallest index still waiting for review.
    pub fn next_unpicked(&self) -> Result<usize> {
        self.tt_done
            .iter()
            .position(|state| state.is_pending())
            .ok_or_else(|| {
                PickError::NotFound(format!("{}: every trace is reviewed", self.name))
            })
    }

    /// Annotation progress summary.
    pub fn pick_counts(&self) -> PickCounts {
        PickCounts {
            ntrace: self.ntrace(),
            picked: self.tt.iter().filter(|&&t| t != UNPICKED).count(),
            reviewed: self
                .tt_done
                .iter()
                .filter(|s| **s == ReviewState::Reviewed)
                .count(),
            pending: self.tt_done.iter().filter(|s| s.is_pending()).count(),
            excluded: self.in_vect.iter().filter(|&&keep| !keep).count(),
        }
    }
}

/// A multi-offset gather: one physical survey acquisition together with
/// the indices of its before/after calibration air shots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mog {
    pub traces: TraceSet,
    /// Index of the air shot recorded before the survey, if paired.
    pub av: Option<usize>,
    /// Index of the air shot recorded after the survey, if paired.
    pub ap: Option<usize>,
}

impl Mog {
    pub fn new(traces: TraceSet) -> Self {
        Self {
            traces,
            av: None,
            ap: None,
        }
    }
}

/// A calibration acquisition shot through air, used to estimate the
/// system time-zero offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirShot {
    pub traces: TraceSet,
}

impl AirShot {
    pub fn new(traces: TraceSet) -> Self {
        Self { traces }
    }
}
