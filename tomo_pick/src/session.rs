//! Session aggregate: every record loaded for one picking session.

use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};
use crate::geometry::Point3;
use crate::survey::{AirShot, Mog};

/// Borehole metadata record. Loaded and saved with the session, read by
/// derived metrics, never mutated by picking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borehole {
    pub name: String,
    pub collar: Point3,
    pub depth: f64,
}

impl Borehole {
    pub fn new(name: impl Into<String>, collar: Point3, depth: f64) -> Self {
        Self {
            name: name.into(),
            collar,
            depth,
        }
    }
}

/// Tomography model metadata record: a named inversion grid over a set
/// of mogs. Carried through load/save verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridModel {
    pub name: String,
    /// Indices into the session's mog sequence.
    pub mog_indices: Vec<usize>,
    pub cell_size: f64,
}

/// The unit of load and save: four ordered sequences. Exactly one session
/// is live per process; a load replaces it wholesale, picking mutates its
/// elements in place, and nothing is destroyed mid-session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub boreholes: Vec<Borehole>,
    pub mogs: Vec<Mog>,
    pub air_shots: Vec<AirShot>,
    pub models: Vec<GridModel>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole in-memory state, the load semantics.
    pub fn replace_with(&mut self, other: Session) {
        *self = other;
    }

    pub fn mog(&self, index: usize) -> Result<&Mog> {
        self.mogs.get(index).ok_or_else(|| {
            PickError::validation(format!(
                "mog index {index} out of range for {} mogs",
                self.mogs.len()
            ))
        })
    }

    pub fn mog_mut(&mut self, index: usize) -> Result<&mut Mog> {
        let count = self.mogs.len();
        self.mogs.get_mut(index).ok_or_else(|| {
            PickError::validation(format!("mog index {index} out of range for {count} mogs"))
        })
    }

    /// Dereferences an air-shot cross-reference. Unlike [`Session::mog`]
    /// this reports a dangling reference, because the index always comes
    /// from a mog's `av`/`ap` field rather than from the caller.
    pub fn air_shot(&self, index: usize) -> Result<&AirShot> {
        self.air_shots.get(index).ok_or_else(|| {
            PickError::Reference(format!(
                "air-shot index {index} out of range for {} air shots",
                self.air_shots.len()
            ))
        })
    }

    pub fn air_shot_mut(&mut self, index: usize) -> Result<&mut AirShot> {
        let count = self.air_shots.len();
        self.air_shots.get_mut(index).ok_or_else(|| {
            PickError::Reference(format!(
                "air-shot index {index} out of range for {count} air shots"
            ))
        })
    }

    /// The air shot recorded before `mog`, or `None` while unpaired.
    pub fn before_shot(&self, mog: &Mog) -> Result<Option<&AirShot>> {
        mog.av.map(|idx| self.air_shot(idx)).transpose()
    }

    /// The air shot recorded after `mog`, or `None` while unpaired.
    pub fn after_shot(&self, mog: &Mog) -> Result<Option<&AirShot>> {
        mog.ap.map(|idx| self.air_shot(idx)).transpose()
    }

    /// Integrity check run after a load: every acquisition structurally
    /// sound, every cross-reference inside the loaded sequences.
    pub fn validate(&self) -> Result<()> {
        for mog in &self.mogs {
            mog.traces.validate()?;
            for linked in [mog.av, mog.ap].into_iter().flatten() {
                self.air_shot(linked)?;
            }
        }
        for shot in &self.air_shots {
            shot.traces.validate()?;
        }
        for model in &self.models {
            for &idx in &model.mog_indices {
                if idx >= self.mogs.len() {
                    return Err(PickError::Reference(format!(
                        "model {} references mog {idx} out of range for {} mogs",
                        model.name,
                        self.mogs.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
