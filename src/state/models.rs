// Data models for the profile registry
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One HMM profile definition.
///
/// `id`, `group_id` and `parent_id` are `None` until reconciliation assigns
/// them from the store. `parent_id` stays `None` for biosynthetic (top-level)
/// profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub group_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub accession: Option<String>,
    pub name: String,
    pub model_length: u32,
}

impl Profile {
    pub fn new(name: String, accession: Option<String>, model_length: u32) -> Self {
        Profile {
            id: None,
            group_id: None,
            parent_id: None,
            accession,
            name,
            model_length,
        }
    }
}

/// A versioned bundle of profiles originating from one pair of source
/// artifacts. The checksum pair is the natural key: at most one stored row
/// may match it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileGroup {
    pub id: Option<i64>,
    pub biosynthetic_checksum: String,
    pub subprofile_checksum: String,
    /// Top-level profiles, in file order.
    pub biosynthetic_profiles: Vec<Profile>,
    /// Parent accession -> sub-profiles, in discovery order.
    pub subprofiles: IndexMap<String, Vec<Profile>>,
}

impl ProfileGroup {
    pub fn new(
        biosynthetic_checksum: String,
        subprofile_checksum: String,
        biosynthetic_profiles: Vec<Profile>,
        subprofiles: IndexMap<String, Vec<Profile>>,
    ) -> Self {
        ProfileGroup {
            id: None,
            biosynthetic_checksum,
            subprofile_checksum,
            biosynthetic_profiles,
            subprofiles,
        }
    }

    /// Total number of profiles across the biosynthetic set and all
    /// sub-profile sets.
    pub fn profile_count(&self) -> usize {
        self.biosynthetic_profiles.len() + self.subprofiles.values().map(Vec::len).sum::<usize>()
    }
}

/// Listing row for registered groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: i64,
    pub biosynthetic_checksum: String,
    pub subprofile_checksum: String,
    pub created_at: DateTime<Utc>,
    pub profile_count: i64,
}
