// HMM profile ingestion module
// Parses profile files and assembles profile groups from disk

pub mod loader;
pub mod parser;

pub use loader::{load_and_register, load_group, LoadError, LoadOptions, LoadResult};
pub use parser::{parse_profiles, FormatError, RawProfileRecord};
