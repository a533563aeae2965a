// hmmbank - HMM profile registry with SQLite-backed deduplication
// Module declarations

pub mod hmm;
pub mod pipeline;
pub mod state;

pub use hmm::{load_and_register, load_group, parse_profiles, LoadError, LoadOptions};
pub use pipeline::TraceWriter;
pub use state::{
    open_db, open_in_memory, save_group, DbConnection, GroupSummary, Profile, ProfileGroup,
    ReconcileError,
};
