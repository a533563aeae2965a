// HMM profile file parsing
// A profile file is a concatenation of records; header lines carry NAME,
// ACC and LENG fields and `//` terminates a record. Everything else
// (match-state rows, other header fields) is ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Profile;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Invalid LENG value {value:?} in profile record")]
    InvalidLength { value: String },

    #[error("Profile record has no NAME field")]
    MissingName,

    #[error("Profile record {name} has no LENG field")]
    MissingLength { name: String },
}

pub type FormatResult<T> = Result<T, FormatError>;

/// Accumulator for one record while its block is being scanned.
/// Field values are the last whitespace-separated token of their line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProfileRecord {
    pub name: Option<String>,
    pub accession: Option<String>,
    pub model_length: Option<u32>,
}

impl RawProfileRecord {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.accession.is_none() && self.model_length.is_none()
    }

    /// Build the profile, failing when a required field never appeared.
    pub fn build(self) -> FormatResult<Profile> {
        let name = self.name.ok_or(FormatError::MissingName)?;
        let model_length = self
            .model_length
            .ok_or_else(|| FormatError::MissingLength { name: name.clone() })?;
        Ok(Profile::new(name, self.accession, model_length))
    }
}

fn last_field(line: &str) -> Option<String> {
    line.split_whitespace().last().map(str::to_string)
}

/// Parse the text of one profile file into profiles, in file order.
///
/// A trailing block without a closing `//` is still emitted if at least one
/// field was set.
pub fn parse_profiles(text: &str) -> FormatResult<Vec<Profile>> {
    let mut profiles = Vec::new();
    let mut record = RawProfileRecord::default();

    for line in text.lines() {
        let line = line.trim_end();
        if line == "//" {
            profiles.push(std::mem::take(&mut record).build()?);
        } else if line.starts_with("NAME") {
            record.name = last_field(line);
        } else if line.starts_with("ACC") {
            record.accession = last_field(line);
        } else if line.starts_with("LENG") {
            let value = last_field(line).unwrap_or_default();
            let length = value
                .parse::<u32>()
                .map_err(|_| FormatError::InvalidLength { value })?;
            record.model_length = Some(length);
        }
    }

    if !record.is_empty() {
        profiles.push(record.build()?);
    }

    Ok(profiles)
}
