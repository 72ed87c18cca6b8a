//! Resources that manage plain local filesystem state.

pub mod file;
pub mod symlink;

pub use file::{File, FileArgs, FileState};
pub use symlink::{Symlink, SymlinkArgs, SymlinkState};
