use crate::model::handle::Handle;
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by project tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors from project tree operations.
///
/// Input rejections leave the store unchanged. `CycleDetected` and
/// `DepthExceeded` are invariant violations: the node layer should never
/// contain a cycle once the builder has run.
#[derive(Debug)]
pub enum TreeError {
    /// Requested item does not exist.
    ItemNotFound(Handle),
    /// Declared parent does not exist.
    ParentNotFound(Handle),
    /// Handle is already tracked.
    DuplicateHandle(Handle),
    /// A trash root already exists.
    SecondTrashRoot { existing: Handle, rejected: Handle },
    /// No free handle was drawn within the retry bound.
    HandleSpaceExhausted { attempts: usize },
    /// Upward walk revisited an item.
    CycleDetected(Handle),
    /// Upward walk exceeded the depth bound.
    DepthExceeded { handle: Handle, max_depth: usize },
    /// Content storage could not be scanned.
    Storage(StorageError),
}

impl TreeError {
    /// Whether this error signals a broken tree invariant rather than bad
    /// input or failed I/O.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::CycleDetected(_) | Self::DepthExceeded { .. })
    }
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(handle) => write!(f, "tree item not found: {handle}"),
            Self::ParentNotFound(handle) => write!(f, "tree parent not found: {handle}"),
            Self::DuplicateHandle(handle) => write!(f, "duplicate item handle: {handle}"),
            Self::SecondTrashRoot { existing, rejected } => write!(
                f,
                "only one trash root allowed: {existing} exists, rejected {rejected}"
            ),
            Self::HandleSpaceExhausted { attempts } => {
                write!(f, "no free item handle after {attempts} attempts")
            }
            Self::CycleDetected(handle) => {
                write!(f, "critical internal error: parent cycle through {handle}")
            }
            Self::DepthExceeded { handle, max_depth } => write!(
                f,
                "critical internal error: item {handle} deeper than {max_depth} levels"
            ),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for TreeError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
