// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! direct_texture_utils: error types, status codes and small structs shared by the rest of the
//! crate.

use std::ffi::NulError;

use remain::sorted;
use thiserror::Error;

use crate::buffer::BufferState;

/// Status returned by every HAL entry point on success.  Any other value is a HAL-defined
/// failure code and is handed back to the caller untouched.
pub const HAL_OK: i32 = 0;

/// Well-known id of the Android graphics buffer allocator module.
pub const GRALLOC_HARDWARE_MODULE_ID: &str = "gralloc";

/// Default HAL library opened at negotiation time.
pub const LIBHARDWARE_PATH: &str = "libhardware.so";

/// GL extension that allows an EGLImage backed by a native buffer to be bound as a texture.
pub const OES_EGL_IMAGE_EXTENSION: &str = "GL_OES_EGL_image";

/// Region of a buffer requested for CPU access, in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LockRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl LockRect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> LockRect {
        LockRect {
            left,
            top,
            width,
            height,
        }
    }

    /// A rect covering a whole `width` x `height` buffer.
    pub fn full(width: u32, height: u32) -> LockRect {
        LockRect::new(0, 0, width, height)
    }
}

/// Reason the zero-copy path was rejected during negotiation.  The `Display` output is the
/// human readable string reported by `DirectTexture::last_error_message`.
#[sorted]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// The renderer does not advertise the required GL extension.
    #[error("No {extension} extension")]
    CapabilityMissing { extension: String },
    /// The HAL library, module or allocator device could not be opened.
    #[error("{0}")]
    ModuleLoadFailed(&'static str),
    /// The GPU is on the deny table.
    #[error("Unsupported GPU")]
    PolicyDenied,
    /// Everything loaded but the buffer storage self-test failed.
    #[error("{0}")]
    ProbeFailed(String),
}

/// An error generated while using this crate.
#[sorted]
#[derive(Error, Debug)]
pub enum DirectTextureError {
    /// Checked Arithmetic error
    #[error("arithmetic failed: {}({}) {op} {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedArithmetic {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
        op: &'static str,
    },
    /// Checked Range error
    #[error("range check failed: {}({}) vs {}({})", .field1.0, .field1.1, .field2.0, .field2.1)]
    CheckedRange {
        field1: (&'static str, usize),
        field2: (&'static str, usize),
    },
    /// A HAL entry point returned a non-zero status.
    #[error("HAL {op} failed with status {code}")]
    HalStatus { op: &'static str, code: i32 },
    /// A buffer operation was issued out of order.
    #[error("cannot {op} a buffer in state {state:?}")]
    InvalidBufferState {
        op: &'static str,
        state: BufferState,
    },
    /// The HAL shared library could not be opened.
    #[cfg(feature = "libhardware")]
    #[error("couldn't open HAL library: {0}")]
    LibraryLoad(libloading::Error),
    /// The HAL library or module lacks a required entry point.
    #[error("HAL entry point {0} is missing")]
    MissingSymbol(&'static str),
    /// `hw_get_module` could not find the requested module.
    #[error("HAL module lookup failed with status {0}")]
    ModuleNotFound(i32),
    #[error("Nul Error occured {0}")]
    NulError(NulError),
    /// The module returned success but no allocator device.
    #[error("HAL returned a null allocator device")]
    NullDevice,
    /// Direct textures are not supported (or negotiation has not succeeded).
    #[error("direct textures are not supported")]
    Unsupported,
}

impl DirectTextureError {
    /// Returns the raw HAL status carried by this error, if any.
    pub fn hal_status(&self) -> Option<i32> {
        match self {
            DirectTextureError::HalStatus { code, .. } => Some(*code),
            DirectTextureError::ModuleNotFound(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<NulError> for DirectTextureError {
    fn from(e: NulError) -> DirectTextureError {
        DirectTextureError::NulError(e)
    }
}

/// The result of an operation in this crate.
pub type DirectTextureResult<T> = std::result::Result<T, DirectTextureError>;

/// Converts a HAL status into a `DirectTextureResult`, keeping the code verbatim on failure.
pub fn hal_result(op: &'static str, code: i32) -> DirectTextureResult<()> {
    if code == HAL_OK {
        Ok(())
    } else {
        Err(DirectTextureError::HalStatus { op, code })
    }
}
