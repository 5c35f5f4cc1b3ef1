//! File input and output for session and pick data.

use std::fs::File;
use std::io::{self, Read, Write};

pub mod session;
pub mod traveltimes;

pub use session::{
    autosave_due, load_session, maybe_autosave, save_session, SessionFile, FORMAT_VERSION,
};
pub use traveltimes::{export_traveltimes, import_traveltimes};

/// Reads a file to string.
pub fn read_to_string(path: &str) -> io::Result<String> {
    let mut buffer = String::new();
    File::open(path)?.read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Reads a file into lines without terminators.
pub fn read_lines(path: &str) -> io::Result<Vec<String>> {
    Ok(read_to_string(path)?
        .lines()
        .map(|line| line.to_string())
        .collect())
}

/// Writes a string to a file, truncating any previous contents.
pub fn write_string(path: &str, contents: &str) -> io::Result<()> {
    File::create(path)?.write_all(contents.as_bytes())
}
