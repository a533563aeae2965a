// Typed select/insert operations for the registry tables
//
// All functions take a `&Connection` rather than locking the shared handle
// themselves, so the reconciliation engine can run an entire save inside one
// transaction.
use chrono::Utc;
use rusqlite::{params, Connection};

use super::db::DbResult;
use super::models::GroupSummary;

/// Resolved profile row, as much of it as reconciliation needs.
#[derive(Debug, Clone, Copy)]
pub struct ProfileRow {
    pub id: i64,
    pub model_length: u32,
}

/// One profile row queued for a batched insert.
#[derive(Debug)]
pub struct NewProfile<'a> {
    pub group_id: i64,
    pub name: &'a str,
    pub accession: Option<&'a str>,
    pub model_length: u32,
}

// ==================== GROUP QUERIES ====================

/// Insert a new group row, returning its assigned id
pub fn insert_group(
    conn: &Connection,
    biosynthetic_checksum: &str,
    subprofile_checksum: &str,
) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO profile_group (biosynthetic_checksum, subprofile_checksum, created_at)
         VALUES (?1, ?2, ?3)",
        params![
            biosynthetic_checksum,
            subprofile_checksum,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find a group id by its checksum pair
pub fn find_group(
    conn: &Connection,
    biosynthetic_checksum: &str,
    subprofile_checksum: &str,
) -> DbResult<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM profile_group
         WHERE biosynthetic_checksum = ?1 AND subprofile_checksum = ?2",
    )?;

    let result = stmt.query_row(params![biosynthetic_checksum, subprofile_checksum], |row| {
        row.get(0)
    });

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List all registered groups with their member counts
pub fn list_groups(conn: &Connection) -> DbResult<Vec<GroupSummary>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.biosynthetic_checksum, g.subprofile_checksum, g.created_at,
                COUNT(p.id) as profile_count
         FROM profile_group g
         LEFT JOIN profile p ON g.id = p.group_id
         GROUP BY g.id
         ORDER BY g.created_at DESC",
    )?;

    let groups = stmt
        .query_map([], |row| {
            Ok(GroupSummary {
                id: row.get(0)?,
                biosynthetic_checksum: row.get(1)?,
                subprofile_checksum: row.get(2)?,
                created_at: row.get::<_, String>(3)?.parse().unwrap(),
                profile_count: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(groups)
}

// ==================== PROFILE QUERIES ====================

/// Find a profile by name within a group
pub fn find_profile(conn: &Connection, group_id: i64, name: &str) -> DbResult<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, model_length FROM profile
         WHERE group_id = ?1 AND name = ?2",
    )?;

    let result = stmt.query_row(params![group_id, name], |row| {
        Ok(ProfileRow {
            id: row.get(0)?,
            model_length: row.get(1)?,
        })
    });

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Find a profile by accession within a group
pub fn find_profile_by_accession(
    conn: &Connection,
    group_id: i64,
    accession: &str,
) -> DbResult<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, model_length FROM profile
         WHERE group_id = ?1 AND accession = ?2",
    )?;

    let result = stmt.query_row(params![group_id, accession], |row| {
        Ok(ProfileRow {
            id: row.get(0)?,
            model_length: row.get(1)?,
        })
    });

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Find a sub-profile by name under a specific parent within a group
pub fn find_subprofile(
    conn: &Connection,
    group_id: i64,
    parent_id: i64,
    name: &str,
) -> DbResult<Option<ProfileRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.model_length
         FROM profile p
         JOIN subprofile_relation s ON p.id = s.profile_id
         WHERE s.parent_profile_id = ?1 AND p.name = ?2 AND p.group_id = ?3",
    )?;

    let result = stmt.query_row(params![parent_id, name, group_id], |row| {
        Ok(ProfileRow {
            id: row.get(0)?,
            model_length: row.get(1)?,
        })
    });

    match result {
        Ok(profile) => Ok(Some(profile)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Batched profile insert; returns the assigned ids in input order
pub fn insert_profiles(conn: &Connection, rows: &[NewProfile]) -> DbResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(rows.len());
    if rows.is_empty() {
        return Ok(ids);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO profile (group_id, name, accession, model_length)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.group_id,
            row.name,
            row.accession,
            row.model_length,
        ])?;
        ids.push(conn.last_insert_rowid());
    }

    Ok(ids)
}

/// Batched insert of (profile_id, parent_profile_id) links
pub fn insert_subprofile_links(conn: &Connection, links: &[(i64, i64)]) -> DbResult<()> {
    if links.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(
        "INSERT INTO subprofile_relation (profile_id, parent_profile_id)
         VALUES (?1, ?2)",
    )?;
    for (profile_id, parent_profile_id) in links {
        stmt.execute(params![profile_id, parent_profile_id])?;
    }

    Ok(())
}

/// Count profile rows belonging to a group
pub fn count_profiles(conn: &Connection, group_id: i64) -> DbResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM profile WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
