//! Session snapshot persistence: a versioned JSON envelope around the
//! four record sequences, written atomically.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{PickError, Result};
use crate::session::{Borehole, GridModel, Session};
use crate::survey::{AirShot, Mog};

/// Version tag written into every snapshot. Bump on any change to the
/// record layout and handle older tags in [`load_session`].
pub const FORMAT_VERSION: u32 = 1;

/// On-disk shape of a saved session.
///
/// `records` is a literal 4-tuple so the sequences keep their fixed
/// order (boreholes, mogs, air shots, models) and a file with any other
/// arity refuses to unpack.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionFile {
    pub version: u32,
    pub saved: DateTime<Utc>,
    pub records: (Vec<Borehole>, Vec<Mog>, Vec<AirShot>, Vec<GridModel>),
}

/// Serializes the whole session to `path`, replacing whatever was
/// there. The write goes to a temporary file in the target directory
/// first and is renamed into place, so a crash never leaves a partial
/// snapshot behind. Missing parent directories are not created.
pub fn save_session(path: &str, session: &Session) -> Result<()> {
    let file = SessionFile {
        version: FORMAT_VERSION,
        saved: Utc::now(),
        records: (
            session.boreholes.clone(),
            session.mogs.clone(),
            session.air_shots.clone(),
            session.models.clone(),
        ),
    };
    let json = serde_json::to_string(&file).map_err(std::io::Error::other)?;

    let target = Path::new(path);
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(target).map_err(|e| PickError::Io(e.error))?;
    info!("saved session to {path}");
    Ok(())
}

/// Deserializes a snapshot, replacing nothing until the whole file
/// unpacks and validates. A file that is not the versioned 4-tuple
/// envelope is reported as corrupt; a missing file stays an I/O error
/// so the shell can offer a retry with another path.
pub fn load_session(path: &str) -> Result<Session> {
    let contents = crate::io::read_to_string(path)?;
    let file: SessionFile = serde_json::from_str(&contents)
        .map_err(|e| PickError::CorruptSession(e.to_string()))?;
    if file.version != FORMAT_VERSION {
        return Err(PickError::CorruptSession(format!(
            "unsupported format version {}",
            file.version
        )));
    }
    let (boreholes, mogs, air_shots, models) = file.records;
    let session = Session {
        boreholes,
        mogs,
        air_shots,
        models,
    };
    session.validate()?;
    info!(
        "loaded session from {path}: {} boreholes, {} mogs, {} air shots, {} models",
        session.boreholes.len(),
        session.mogs.len(),
        session.air_shots.len(),
        session.models.len()
    );
    Ok(session)
}

/// True exactly when `count` is a positive multiple of 50, the cadence
/// at which a picking session snapshots itself.
pub fn autosave_due(count: u64) -> bool {
    count > 0 && count % 50 == 0
}

/// Snapshots the session when the committed-pick count hits the
/// autosave cadence. Returns whether a save happened.
pub fn maybe_autosave(path: &str, session: &Session, count: u64) -> Result<bool> {
    if autosave_due(count) {
        save_session(path, session)?;
        Ok(true)
    } else {
        Ok(false)
    }
}
