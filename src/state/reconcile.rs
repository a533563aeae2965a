// Reconciliation of in-memory profile groups against the store
//
// A group is fingerprinted by its checksum pair. If a row with that pair
// exists, the group is treated as fully persisted and every member id is
// re-resolved by lookup without inserting anything, so resubmitting an
// already-loaded group is a no-op. Otherwise the group and all of its
// members are inserted, wiring parent links by accession lookup. The whole
// save runs in one transaction: a failure partway leaves no partial group.
use rusqlite::Connection;
use thiserror::Error;

use super::db::{DbConnection, DbError};
use super::models::{Profile, ProfileGroup};
use super::queries::{self, NewProfile};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error(
        "Conflicting entry for profile {name}: stored model length {stored}, submitted {submitted}"
    )]
    Conflict {
        name: String,
        stored: u32,
        submitted: u32,
    },
    #[error("Group {group_id} exists but member {name} could not be resolved")]
    MissingMember { group_id: i64, name: String },
    #[error("Sub-profile parent accession {accession} is not in the biosynthetic set")]
    UnknownParent { accession: String },
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Persist a profile group, or re-resolve its ids if an identical group
/// (same checksum pair) is already stored.
///
/// On return every member profile carries its persisted `id`, `group_id`
/// and, for sub-profiles, `parent_id`.
pub fn save_group(group: &mut ProfileGroup, db: &DbConnection) -> ReconcileResult<()> {
    let conn = db.lock();
    let tx = conn.unchecked_transaction().map_err(DbError::from)?;

    match queries::find_group(
        &tx,
        &group.biosynthetic_checksum,
        &group.subprofile_checksum,
    )? {
        Some(group_id) => rehydrate_group(group, group_id, &tx)?,
        None => insert_group_cascade(group, &tx)?,
    }

    tx.commit().map_err(DbError::from)?;
    Ok(())
}

/// Existing-group branch: assign ids purely by lookup, zero inserts.
fn rehydrate_group(
    group: &mut ProfileGroup,
    group_id: i64,
    conn: &Connection,
) -> ReconcileResult<()> {
    group.id = Some(group_id);

    for profile in &mut group.biosynthetic_profiles {
        let row = queries::find_profile(conn, group_id, &profile.name)?.ok_or_else(|| {
            ReconcileError::MissingMember {
                group_id,
                name: profile.name.clone(),
            }
        })?;
        check_model_length(&profile.name, row.model_length, profile.model_length)?;
        profile.id = Some(row.id);
        profile.group_id = Some(group_id);
    }

    for (parent_accession, subprofiles) in group.subprofiles.iter_mut() {
        let parent = queries::find_profile_by_accession(conn, group_id, parent_accession)?
            .ok_or_else(|| ReconcileError::MissingMember {
                group_id,
                name: parent_accession.clone(),
            })?;
        for profile in subprofiles.iter_mut() {
            let row = queries::find_subprofile(conn, group_id, parent.id, &profile.name)?
                .ok_or_else(|| ReconcileError::MissingMember {
                    group_id,
                    name: profile.name.clone(),
                })?;
            check_model_length(&profile.name, row.model_length, profile.model_length)?;
            profile.id = Some(row.id);
            profile.group_id = Some(group_id);
            profile.parent_id = Some(parent.id);
        }
    }

    log::debug!(
        "Profile group {} already registered, re-resolved {} member ids",
        group_id,
        group.profile_count()
    );
    Ok(())
}

/// New-group branch: insert the group row, then cascade member inserts with
/// batched writes.
fn insert_group_cascade(group: &mut ProfileGroup, conn: &Connection) -> ReconcileResult<()> {
    let group_id = queries::insert_group(
        conn,
        &group.biosynthetic_checksum,
        &group.subprofile_checksum,
    )?;
    group.id = Some(group_id);

    // Biosynthetic profiles first; sub-profile parents resolve against them
    let pending = collect_pending(conn, group_id, None, &mut group.biosynthetic_profiles)?;
    let rows: Vec<NewProfile> = pending
        .iter()
        .map(|&idx| new_row(&group.biosynthetic_profiles[idx], group_id))
        .collect();
    let ids = queries::insert_profiles(conn, &rows)?;
    for (&idx, &id) in pending.iter().zip(ids.iter()) {
        group.biosynthetic_profiles[idx].id = Some(id);
    }

    // Sub-profiles: resolve every parent, accumulate the whole set, then
    // issue one batched profile insert and one batched link insert
    let mut pending_subs: Vec<(usize, usize, i64)> = Vec::new();
    for (map_idx, (parent_accession, subprofiles)) in group.subprofiles.iter_mut().enumerate() {
        let parent = queries::find_profile_by_accession(conn, group_id, parent_accession)?
            .ok_or_else(|| ReconcileError::UnknownParent {
                accession: parent_accession.clone(),
            })?;
        let pending = collect_pending(conn, group_id, Some(parent.id), subprofiles)?;
        pending_subs.extend(pending.into_iter().map(|idx| (map_idx, idx, parent.id)));
    }

    let rows: Vec<NewProfile> = pending_subs
        .iter()
        .map(|&(map_idx, idx, _)| new_row(&group.subprofiles[map_idx][idx], group_id))
        .collect();
    let ids = queries::insert_profiles(conn, &rows)?;

    let mut links = Vec::with_capacity(ids.len());
    for (&(map_idx, idx, parent_id), &id) in pending_subs.iter().zip(ids.iter()) {
        group.subprofiles[map_idx][idx].id = Some(id);
        links.push((id, parent_id));
    }
    queries::insert_subprofile_links(conn, &links)?;

    log::info!(
        "Registered profile group {} ({} biosynthetic profiles, {} sub-profile sets)",
        group_id,
        group.biosynthetic_profiles.len(),
        group.subprofiles.len()
    );
    Ok(())
}

/// Member-level lookup-or-queue: profiles already stored under the same
/// `(name, group_id)` adopt the existing id (re-entry after a partial prior
/// run) after the model-length conflict check; the rest are returned as
/// indexes queued for the batched insert.
fn collect_pending(
    conn: &Connection,
    group_id: i64,
    parent_id: Option<i64>,
    profiles: &mut [Profile],
) -> ReconcileResult<Vec<usize>> {
    let mut pending = Vec::new();
    for (idx, profile) in profiles.iter_mut().enumerate() {
        profile.group_id = Some(group_id);
        profile.parent_id = parent_id;
        match queries::find_profile(conn, group_id, &profile.name)? {
            Some(row) => {
                check_model_length(&profile.name, row.model_length, profile.model_length)?;
                profile.id = Some(row.id);
            }
            None => pending.push(idx),
        }
    }
    Ok(pending)
}

fn new_row(profile: &Profile, group_id: i64) -> NewProfile<'_> {
    NewProfile {
        group_id,
        name: &profile.name,
        accession: profile.accession.as_deref(),
        model_length: profile.model_length,
    }
}

fn check_model_length(name: &str, stored: u32, submitted: u32) -> ReconcileResult<()> {
    if stored != submitted {
        return Err(ReconcileError::Conflict {
            name: name.to_string(),
            stored,
            submitted,
        });
    }
    Ok(())
}
