//! Error Types
//!
//! This module defines the error type returned by fallible Manager
//! operations.
//!
//! # Overview
//!
//! [`MjolnirError`] covers the two error *kinds* that surface as a
//! `Result`: capacity exhaustion and device-allocation failure. The
//! other two kinds in the Manager's error-handling contract —
//! invalid handle and not-found — are not represented here; they
//! surface as `Option::None` from `get`/`find_*` lookups instead of
//! errors.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mjolnir::errors::{MjolnirError, Result};
//!
//! fn create_mesh() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The error type for fallible Manager operations.
#[derive(Error, Debug)]
pub enum MjolnirError {
    // ========================================================================
    // Capacity errors
    // ========================================================================
    /// A pool or slab size class has no room for another allocation.
    #[error("capacity exhausted: {resource}")]
    CapacityExhausted {
        /// Name of the pool or slab class that is full.
        resource: &'static str,
    },

    // ========================================================================
    // Device errors
    // ========================================================================
    /// A device buffer or image allocation failed. Any partial resources
    /// acquired before the failure have already been released.
    #[error("device allocation failed: {0}")]
    DeviceAllocationFailed(String),

    /// Failed to request a compatible GPU adapter.
    #[error("failed to request GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),
}

/// Alias for `Result<T, MjolnirError>`.
pub type Result<T> = std::result::Result<T, MjolnirError>;
