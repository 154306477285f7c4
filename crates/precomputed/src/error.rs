use std::io;
use std::path::PathBuf;

use crate::registry::SegmentId;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while encoding meshes or assembling a dataset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("malformed fragment: {0}")]
    MalformedFragment(String),

    #[error("segment id {0} is already reserved")]
    DuplicateId(SegmentId),

    #[error("segment id {0} was never reserved")]
    UnknownId(SegmentId),

    #[error("no unused segment id left after {0}")]
    IdSpaceExhausted(SegmentId),

    #[error("extent calculator already finalized")]
    CalculatorFinalized,

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("input file {} does not exist", .0.display())]
    MissingInputFile(PathBuf),

    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Only a missing source file lets a build carry on; everything else aborts it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MissingInputFile(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
