//! Workspace error type

use thiserror::Error;

/// Errors surfaced by the Veneer scroll system.
///
/// Measurement failures never show up here; they degrade locally to safe
/// defaults. Only construction-time problems are fatal.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The initialization target is not a usable element.
    #[error("target is not a usable element")]
    InvalidTarget,

    /// The initialization target is not attached to the tree.
    #[error("target element is detached from the tree")]
    DetachedTarget,

    /// Initialization was canceled by the target's cancel conditions.
    #[error("initialization canceled by target configuration")]
    InitializationCanceled,

    /// A style/metric probe failed in a restricted environment.
    #[error("style access is restricted")]
    RestrictedEnvironment,
}
