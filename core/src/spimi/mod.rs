//! Single-Pass-In-Memory indexing: parallel workers invert batches of the
//! corpus into sorted block files, then a single-threaded finalizer merges
//! everything into the on-disk index.

mod coordinator;
mod finalize;
mod worker;

pub use coordinator::{build, BuildResult};
