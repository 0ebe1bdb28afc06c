//! Resource handles and permission scopes.
//!
//! The engine treats the resource a job operates on as opaque: it acquires
//! one reference at creation and releases it exactly once during completion
//! dispatch. What the resource *is* (a block device, a remote store, a
//! file) is entirely up to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Access scope a job holds on its resource.
///
/// Advisory: the engine records and exposes the scope but never enforces
/// it; enforcement is the resource provider's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(u32);

impl Permissions {
    /// No access.
    pub const NONE: Permissions = Permissions(0);
    /// Read access.
    pub const READ: Permissions = Permissions(1);
    /// Write access.
    pub const WRITE: Permissions = Permissions(1 << 1);
    /// Resize access.
    pub const RESIZE: Permissions = Permissions(1 << 2);
    /// Every permission.
    pub const ALL: Permissions = Permissions(!0);

    /// Whether this scope includes all of `other`.
    pub fn contains(&self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two scopes.
    pub fn union(&self, other: Permissions) -> Permissions {
        Permissions(self.0 | other.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Opaque handle to the external resource a job operates on.
pub trait Resource: Send + Sync {
    /// Name of the resource, for logging.
    fn name(&self) -> &str;
}

/// An owned reference to a resource, held by exactly one job.
///
/// Acquired at job creation and released exactly once during completion
/// dispatch, before the completion callback runs. Not cloneable; ownership
/// moves into the job.
pub struct ResourceRef {
    handle: Arc<dyn Resource>,
    permissions: Permissions,
}

impl ResourceRef {
    /// Acquire a reference to `handle` with the given permission scope.
    pub fn acquire(handle: Arc<dyn Resource>, permissions: Permissions) -> Self {
        tracing::trace!(resource = handle.name(), %permissions, "resource reference acquired");
        Self {
            handle,
            permissions,
        }
    }

    /// Name of the underlying resource.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Permission scope this reference was acquired with.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Release the reference. Consumes `self`, so a reference cannot be
    /// released twice or used afterwards.
    pub(crate) fn release(self) {
        tracing::trace!(resource = self.handle.name(), "resource reference released");
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("resource", &self.handle.name())
            .field("permissions", &self.permissions)
            .finish()
    }
}
