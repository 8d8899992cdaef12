use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::common::config::PageId;

/// Failures surfaced by the disk layer. The buffer pool reports these through
/// its boolean/`Option` API after logging; they never cross it as panics.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("failed to open database file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O on page {page_id} failed: {source}")]
    PageIo {
        page_id: PageId,
        #[source]
        source: io::Error,
    },
}
