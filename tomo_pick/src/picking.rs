//! Pick controller: turns pointer actions into annotation mutations.
//!
//! The controller owns the per-session selection state (active mog,
//! active trace, target and pick modes) so no other component carries an
//! ambient "current survey". Every committed mutation is pushed onto a
//! drainable event queue; the rendering panels redraw from the session
//! itself and never keep their own copy of pick state.

use std::collections::VecDeque;

use log::debug;

use crate::error::{PickError, Result};
use crate::session::Session;
use crate::survey::TraceSet;

/// Which annotation arrays a pointer action mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    MainSurvey,
    AirShotBefore,
    AirShotAfter,
}

/// What a primary click means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickMode {
    /// Primary click commits a travel-time pick on the active trace.
    #[default]
    TravelTime,
    /// Primary click moves the active trace to the nearest one.
    TraceSelect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Panel a click landed in. The waveform panel maps its horizontal axis
/// to time; the trace gather maps its vertical axis to time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelView {
    Waveform,
    Gather,
}

/// One pointer action, forwarded untranslated by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerClick {
    pub view: PanelView,
    pub button: PointerButton,
    pub x: f64,
    pub y: f64,
}

impl PointerClick {
    /// Time coordinate of the click given the panel orientation.
    pub fn time(&self) -> f64 {
        match self.view {
            PanelView::Waveform => self.x,
            PanelView::Gather => self.y,
        }
    }
}

/// Notification pushed after every committed mutation so the panels and
/// summary fields refresh from the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChangeEvent {
    PickSet {
        target: TargetMode,
        trace: usize,
        time: f64,
    },
    UncertaintySet {
        target: TargetMode,
        trace: usize,
        half_width: f64,
    },
    PickReset {
        target: TargetMode,
        trace: usize,
    },
    TraceChanged {
        trace: usize,
    },
    TargetChanged {
        mode: TargetMode,
    },
    SurveyChanged {
        mog: Option<usize>,
    },
}

/// Index of the position closest to `x`, scanning first to last so ties
/// resolve to the lower index.
pub fn nearest_trace(positions: &[f64], x: f64) -> Option<usize> {
    let mut best = None;
    let mut best_dist = f64::INFINITY;
    for (i, &p) in positions.iter().enumerate() {
        let d = (p - x).abs();
        if d < best_dist {
            best_dist = d;
            best = Some(i);
        }
    }
    best
}

#[derive(Debug, Default)]
pub struct PickController {
    mog_index: Option<usize>,
    trace_index: usize,
    target_mode: TargetMode,
    pick_mode: PickMode,
    /// When set, the middle button jumps to the lowest pending trace
    /// instead of advancing sequentially.
    pub jump_to_unpicked: bool,
    picks_committed: u64,
    events: VecDeque<ChangeEvent>,
}

impl PickController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_survey_index(&self) -> Option<usize> {
        self.mog_index
    }

    pub fn current_trace_index(&self) -> usize {
        self.trace_index
    }

    pub fn current_target_mode(&self) -> TargetMode {
        self.target_mode
    }

    pub fn pick_mode(&self) -> PickMode {
        self.pick_mode
    }

    pub fn set_pick_mode(&mut self, mode: PickMode) {
        self.pick_mode = mode;
    }

    /// Total picks committed through this controller, the counter the
    /// autosave cadence runs on.
    pub fn picks_committed(&self) -> u64 {
        self.picks_committed
    }

    /// Makes `index` the active survey and rewinds to its first trace.
    pub fn select_survey(&mut self, session: &Session, index: usize) -> Result<()> {
        session.mog(index)?;
        self.mog_index = Some(index);
        self.trace_index = 0;
        self.push(ChangeEvent::SurveyChanged { mog: Some(index) });
        Ok(())
    }

    /// Drops the active survey, e.g. after the session was replaced.
    pub fn clear_survey(&mut self) {
        self.mog_index = None;
        self.trace_index = 0;
        self.push(ChangeEvent::SurveyChanged { mog: None });
    }

    pub fn set_target_mode(&mut self, mode: TargetMode) {
        self.target_mode = mode;
        self.push(ChangeEvent::TargetChanged { mode });
    }

    /// Moves the active trace, bounds-checked against the target arrays.
    pub fn set_trace(&mut self, session: &Session, index: usize) -> Result<()> {
        let ntrace = self.target_traces(session)?.ntrace();
        if index >= ntrace {
            return Err(PickError::validation(format!(
                "trace index {index} out of range for {ntrace} traces"
            )));
        }
        self.trace_index = index;
        self.push(ChangeEvent::TraceChanged { trace: index });
        Ok(())
    }

    /// Middle-button semantics: advance sequentially (clamped at the
    /// last trace) or jump to the lowest trace still pending review.
    pub fn advance_trace(&mut self, session: &Session) -> Result<usize> {
        let traces = self.target_traces(session)?;
        let next = if self.jump_to_unpicked {
            traces.next_unpicked()?
        } else {
            (self.trace_index + 1).min(traces.ntrace().saturating_sub(1))
        };
        self.trace_index = next;
        self.push(ChangeEvent::TraceChanged { trace: next });
        Ok(next)
    }

    /// Resolves one pointer action into exactly one annotation mutation
    /// or navigation step. `trace_positions` carries the horizontal
    /// position the panel drew each trace at; it is only consulted for
    /// trace-selection snaps.
    pub fn handle_click(
        &mut self,
        session: &mut Session,
        click: PointerClick,
        trace_positions: &[f64],
    ) -> Result<ChangeEvent> {
        if self.mog_index.is_none() {
            return Err(PickError::NoActiveSurvey);
        }
        match click.button {
            PointerButton::Primary => match self.pick_mode {
                PickMode::TraceSelect => {
                    let snapped = nearest_trace(trace_positions, click.x).ok_or_else(|| {
                        PickError::validation("no trace positions to snap to")
                    })?;
                    self.trace_index = snapped;
                    Ok(self.push(ChangeEvent::TraceChanged { trace: snapped }))
                }
                PickMode::TravelTime => {
                    let trace = self.trace_index;
                    let time = click.time();
                    let target = self.target_mode;
                    self.target_traces_mut(session)?.set_pick(trace, time)?;
                    self.picks_committed += 1;
                    debug!(
                        "pick {time:.3} on trace {trace} ({:?}), {} committed",
                        target, self.picks_committed
                    );
                    Ok(self.push(ChangeEvent::PickSet {
                        target,
                        trace,
                        time,
                    }))
                }
            },
            PointerButton::Secondary => {
                let trace = self.trace_index;
                let time = click.time();
                let target = self.target_mode;
                let traces = self.target_traces_mut(session)?;
                if trace >= traces.ntrace() {
                    return Err(PickError::validation(format!(
                        "trace index {trace} out of range for {} traces",
                        traces.ntrace()
                    )));
                }
                if !traces.is_picked(trace) {
                    return Err(PickError::validation(
                        "uncertainty needs a committed travel time on the trace",
                    ));
                }
                let half_width = (traces.tt[trace] - time).abs();
                traces.set_uncertainty(trace, half_width)?;
                Ok(self.push(ChangeEvent::UncertaintySet {
                    target,
                    trace,
                    half_width,
                }))
            }
            PointerButton::Middle => {
                let next = self.advance_trace(session)?;
                Ok(ChangeEvent::TraceChanged { trace: next })
            }
        }
    }

    /// Clears the pick on the active trace of the active target.
    pub fn reset_current_trace(&mut self, session: &mut Session) -> Result<ChangeEvent> {
        let trace = self.trace_index;
        let target = self.target_mode;
        self.target_traces_mut(session)?.reset_pick(trace)?;
        Ok(self.push(ChangeEvent::PickReset { target, trace }))
    }

    /// Removes and returns every queued notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        self.events.drain(..).collect()
    }

    /// The annotation arrays the current target mode resolves to.
    pub fn target_traces<'a>(&self, session: &'a Session) -> Result<&'a TraceSet> {
        let mog_index = self.mog_index.ok_or(PickError::NoActiveSurvey)?;
        let mog = session.mog(mog_index)?;
        match self.target_mode {
            TargetMode::MainSurvey => Ok(&mog.traces),
            TargetMode::AirShotBefore => {
                let linked = mog.av.ok_or_else(|| {
                    PickError::validation("mog has no before air shot paired")
                })?;
                Ok(&session.air_shot(linked)?.traces)
            }
            TargetMode::AirShotAfter => {
                let linked = mog.ap.ok_or_else(|| {
                    PickError::validation("mog has no after air shot paired")
                })?;
                Ok(&session.air_shot(linked)?.traces)
            }
        }
    }

    fn target_traces_mut<'a>(&self, session: &'a mut Session) -> Result<&'a mut TraceSet> {
        let mog_index = self.mog_index.ok_or(PickError::NoActiveSurvey)?;
        match self.target_mode {
            TargetMode::MainSurvey => Ok(&mut session.mog_mut(mog_index)?.traces),
            TargetMode::AirShotBefore => {
                let linked = session.mog(mog_index)?.av.ok_or_else(|| {
                    PickError::validation("mog has no before air shot paired")
                })?;
                Ok(&mut session.air_shot_mut(linked)?.traces)
            }
            TargetMode::AirShotAfter => {
                let linked = session.mog(mog_index)?.ap.ok_or_else(|| {
                    PickError::validation("mog has no after air shot paired")
                })?;
                Ok(&mut session.air_shot_mut(linked)?.traces)
            }
        }
    }

    fn push(&mut self, event: ChangeEvent) -> ChangeEvent {
        self.events.push_back(event);
        event
    }
}
