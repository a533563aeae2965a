// Profile group loading
// Walks the directory layout produced by the profile-generation pipeline,
// reads the precomputed checksums and assembles an in-memory ProfileGroup

use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::parser::{self, FormatError};
use crate::pipeline::{TraceEntry, TraceWriter};
use crate::state::reconcile::{self, ReconcileError};
use crate::state::storage::{self, StorageError};
use crate::state::{DbConnection, Profile, ProfileGroup};

// Fixed layout convention of a profile directory
const BIOSYNTHETIC_DIR: &str = "biosynthetic_pfams";
const BIOSYNTHETIC_HMM: &str = "Pfam-A.biosynthetic.hmm";
const BIOSYNTHETIC_MD5: &str = "biopfam.md5sum";
const SUBPROFILE_DIR: &str = "sub_pfams";
const SUBPROFILE_HMM_DIR: &str = "hmm";
const SUBPROFILE_MD5: &str = "corepfam.md5sum";
const SUBPROFILE_SUFFIX: &str = ".subpfams.hmm";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Format error in {path}: {source}")]
    Format { path: PathBuf, source: FormatError },

    #[error("Checksum mismatch for {path}: checksum file says {expected}, computed {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Loader configuration
#[derive(Debug, Default)]
pub struct LoadOptions {
    /// Recompute artifact digests and fail when they disagree with the
    /// precomputed checksum files
    pub verify_checksums: bool,
    /// Optional JSONL ingest trace
    pub trace: Option<TraceWriter>,
}

/// Assemble a ProfileGroup from a profile directory.
/// Performs no reconciliation; the returned group carries no ids yet.
pub fn load_group(dir: &Path, options: &LoadOptions) -> LoadResult<ProfileGroup> {
    let biosynthetic_hmm = dir.join(BIOSYNTHETIC_DIR).join(BIOSYNTHETIC_HMM);
    let biosynthetic_md5 = dir.join(BIOSYNTHETIC_DIR).join(BIOSYNTHETIC_MD5);
    let subprofile_dir = dir.join(SUBPROFILE_DIR).join(SUBPROFILE_HMM_DIR);
    let subprofile_md5 = dir.join(SUBPROFILE_DIR).join(SUBPROFILE_MD5);

    let biosynthetic_checksum = storage::read_checksum_file(&biosynthetic_md5)?;
    let subprofile_checksum = storage::read_checksum_file(&subprofile_md5)?;

    let subprofile_files = find_subprofile_files(&subprofile_dir)?;

    if options.verify_checksums {
        let computed = storage::file_digest(&biosynthetic_hmm)?;
        verify_digest(&biosynthetic_hmm, &biosynthetic_checksum, &computed)?;

        let paths: Vec<PathBuf> = subprofile_files.iter().map(|(_, p)| p.clone()).collect();
        let computed = storage::files_digest(&paths)?;
        verify_digest(&subprofile_dir, &subprofile_checksum, &computed)?;
    }
    write_trace(
        options,
        TraceEntry::with_data(
            "checksum",
            "Read source artifact checksums",
            serde_json::json!({
                "biosynthetic_checksum": biosynthetic_checksum,
                "subprofile_checksum": subprofile_checksum,
            }),
        ),
    );

    let biosynthetic_profiles = parse_file(&biosynthetic_hmm)?;
    let mut subprofiles = IndexMap::new();
    for (parent_accession, path) in &subprofile_files {
        subprofiles.insert(parent_accession.clone(), parse_file(path)?);
    }

    let group = ProfileGroup::new(
        biosynthetic_checksum,
        subprofile_checksum,
        biosynthetic_profiles,
        subprofiles,
    );
    write_trace(
        options,
        TraceEntry::with_data(
            "parse",
            "Parsed profile artifacts",
            serde_json::json!({
                "biosynthetic": group.biosynthetic_profiles.len(),
                "subprofile_sets": group.subprofiles.len(),
                "profiles": group.profile_count(),
            }),
        ),
    );
    log::debug!(
        "Loaded profile group from {}: {} profiles in {} sub-profile sets",
        dir.display(),
        group.profile_count(),
        group.subprofiles.len()
    );

    Ok(group)
}

/// Load a profile directory and immediately reconcile it against the store
pub fn load_and_register(
    dir: &Path,
    db: &DbConnection,
    options: &LoadOptions,
) -> LoadResult<ProfileGroup> {
    let mut group = load_group(dir, options)?;
    reconcile::save_group(&mut group, db)?;
    write_trace(
        options,
        TraceEntry::with_data(
            "reconcile",
            "Profile group reconciled",
            serde_json::json!({ "group_id": group.id }),
        ),
    );
    Ok(group)
}

fn parse_file(path: &Path) -> LoadResult<Vec<Profile>> {
    let text = fs::read_to_string(path)?;
    parser::parse_profiles(&text).map_err(|source| LoadError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// Sub-profile artifacts, one file per parent accession, in lexical order
fn find_subprofile_files(dir: &Path) -> LoadResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(parent_accession) = name.strip_suffix(SUBPROFILE_SUFFIX) {
                files.push((parent_accession.to_string(), path.clone()));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// The first whitespace-separated field of a checksum line is the digest;
/// md5sum-style files append the file name after it
fn verify_digest(path: &Path, checksum_line: &str, computed: &str) -> LoadResult<()> {
    let expected = checksum_line.split_whitespace().next().unwrap_or("");
    if !expected.eq_ignore_ascii_case(computed) {
        return Err(LoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual: computed.to_string(),
        });
    }
    Ok(())
}

// Trace failures are logged, never fatal for the load itself
fn write_trace(options: &LoadOptions, entry: TraceEntry) {
    if let Some(writer) = &options.trace {
        if let Err(e) = writer.write(&entry) {
            log::warn!("Failed to write ingest trace entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::read_trace_file;
    use crate::state::open_in_memory;
    use tempfile::TempDir;

    const BIO_TEXT: &str = "NAME pfamA\nACC PF00001\nLENG 120\n//\nNAME pfamB\nACC PF00002\nLENG 80\n//\n";
    const SUB_TEXT: &str = "NAME pfamA.1\nLENG 60\n//\nNAME pfamA.2\nLENG 55\n//\n";

    fn write_group_dir(root: &Path, bio_text: &str, subs: &[(&str, &str)]) {
        let bio_dir = root.join(BIOSYNTHETIC_DIR);
        fs::create_dir_all(&bio_dir).unwrap();
        fs::write(bio_dir.join(BIOSYNTHETIC_HMM), bio_text).unwrap();
        fs::write(bio_dir.join(BIOSYNTHETIC_MD5), "bio-checksum\n").unwrap();

        let sub_dir = root.join(SUBPROFILE_DIR).join(SUBPROFILE_HMM_DIR);
        fs::create_dir_all(&sub_dir).unwrap();
        for (accession, text) in subs {
            fs::write(sub_dir.join(format!("{accession}{SUBPROFILE_SUFFIX}")), text).unwrap();
        }
        fs::write(
            root.join(SUBPROFILE_DIR).join(SUBPROFILE_MD5),
            "sub-checksum\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_group_assembles_hierarchy() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(temp_dir.path(), BIO_TEXT, &[("PF00001", SUB_TEXT)]);

        let group = load_group(temp_dir.path(), &LoadOptions::default()).unwrap();

        assert_eq!(group.biosynthetic_checksum, "bio-checksum");
        assert_eq!(group.subprofile_checksum, "sub-checksum");
        assert_eq!(group.biosynthetic_profiles.len(), 2);
        assert_eq!(group.subprofiles.len(), 1);
        assert_eq!(group.subprofiles["PF00001"].len(), 2);
        assert_eq!(group.subprofiles["PF00001"][0].name, "pfamA.1");
        assert!(group.id.is_none());
    }

    #[test]
    fn test_subprofile_sets_are_keyed_and_ordered_by_accession() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(
            temp_dir.path(),
            BIO_TEXT,
            &[
                ("PF00002", "NAME pfamB.1\nLENG 33\n//\n"),
                ("PF00001", SUB_TEXT),
            ],
        );

        let group = load_group(temp_dir.path(), &LoadOptions::default()).unwrap();

        let keys: Vec<&String> = group.subprofiles.keys().collect();
        assert_eq!(keys, ["PF00001", "PF00002"]);
    }

    #[test]
    fn test_missing_artifact_propagates_io_error() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(temp_dir.path(), BIO_TEXT, &[("PF00001", SUB_TEXT)]);
        fs::remove_file(
            temp_dir
                .path()
                .join(BIOSYNTHETIC_DIR)
                .join(BIOSYNTHETIC_HMM),
        )
        .unwrap();

        let err = load_group(temp_dir.path(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_malformed_artifact_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(
            temp_dir.path(),
            "NAME pfamA\nLENG twelve\n//\n",
            &[("PF00001", SUB_TEXT)],
        );

        let err = load_group(temp_dir.path(), &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Format { path, source } => {
                assert!(path.ends_with(BIOSYNTHETIC_HMM));
                assert!(matches!(source, FormatError::InvalidLength { .. }));
            }
            other => panic!("expected Format, got {other:?}"),
        }
    }

    #[test]
    fn test_checksum_verification() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(temp_dir.path(), BIO_TEXT, &[("PF00001", SUB_TEXT)]);

        // Rewrite the checksum files with real digests, md5sum-style
        let bio_digest = storage::calculate_md5(BIO_TEXT.as_bytes());
        fs::write(
            temp_dir.path().join(BIOSYNTHETIC_DIR).join(BIOSYNTHETIC_MD5),
            format!("{bio_digest}  {BIOSYNTHETIC_HMM}\n"),
        )
        .unwrap();
        let sub_digest = storage::calculate_md5(SUB_TEXT.as_bytes());
        fs::write(
            temp_dir.path().join(SUBPROFILE_DIR).join(SUBPROFILE_MD5),
            format!("{sub_digest}\n"),
        )
        .unwrap();

        let options = LoadOptions {
            verify_checksums: true,
            ..Default::default()
        };
        let group = load_group(temp_dir.path(), &options).unwrap();
        assert_eq!(group.biosynthetic_profiles.len(), 2);

        // Corrupt one artifact; the digest no longer matches
        fs::write(
            temp_dir
                .path()
                .join(BIOSYNTHETIC_DIR)
                .join(BIOSYNTHETIC_HMM),
            "NAME tampered\nLENG 1\n//\n",
        )
        .unwrap();
        let err = load_group(temp_dir.path(), &options).unwrap_err();
        assert!(matches!(err, LoadError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_load_and_register_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(temp_dir.path(), BIO_TEXT, &[("PF00001", SUB_TEXT)]);

        let db = open_in_memory().unwrap();
        let group = load_and_register(temp_dir.path(), &db, &LoadOptions::default()).unwrap();

        let group_id = group.id.unwrap();
        let parent_id = group.biosynthetic_profiles[0].id;
        assert!(parent_id.is_some());
        for sub in &group.subprofiles["PF00001"] {
            assert_eq!(sub.parent_id, parent_id);
            assert_eq!(sub.group_id, Some(group_id));
        }

        // A second load of the same directory is a pure re-hydration
        let again = load_and_register(temp_dir.path(), &db, &LoadOptions::default()).unwrap();
        assert_eq!(again.id, group.id);
        assert_eq!(
            again.biosynthetic_profiles[0].id,
            group.biosynthetic_profiles[0].id
        );
    }

    #[test]
    fn test_orphan_subprofile_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(
            temp_dir.path(),
            BIO_TEXT,
            &[("pfamY", "NAME pfamY.1\nLENG 40\n//\n")],
        );

        let db = open_in_memory().unwrap();
        let err = load_and_register(temp_dir.path(), &db, &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Reconcile(ReconcileError::UnknownParent { accession }) => {
                assert_eq!(accession, "pfamY")
            }
            other => panic!("expected UnknownParent, got {other:?}"),
        }
    }

    #[test]
    fn test_trace_records_ingest_stages() {
        let temp_dir = TempDir::new().unwrap();
        write_group_dir(temp_dir.path(), BIO_TEXT, &[("PF00001", SUB_TEXT)]);

        let trace_path = temp_dir.path().join("ingest.jsonl");
        let options = LoadOptions {
            verify_checksums: false,
            trace: Some(TraceWriter::new(trace_path.clone())),
        };
        let db = open_in_memory().unwrap();
        load_and_register(temp_dir.path(), &db, &options).unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        let stages: Vec<&str> = entries.iter().map(|e| e.stage.as_str()).collect();
        assert_eq!(stages, ["checksum", "parse", "reconcile"]);
        assert_eq!(entries[1].data.as_ref().unwrap()["profiles"], 4);
    }
}
