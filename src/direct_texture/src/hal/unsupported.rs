// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stub HAL used when the `libhardware` feature is disabled.  It never loads anything, so
//! negotiation always ends with the hardware path reported as unsupported.

#![cfg(not(feature = "libhardware"))]

use crate::direct_texture_utils::*;
use crate::hal::GrallocModule;
use crate::hal::HalLoader;

/// A loader with no backend behind it.
pub struct UnsupportedHal;

impl HalLoader for UnsupportedHal {
    fn open_module(&mut self, _id: &str) -> DirectTextureResult<Box<dyn GrallocModule>> {
        Err(DirectTextureError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_opens_a_module() {
        let mut hal = UnsupportedHal;
        assert!(matches!(
            hal.open_module(GRALLOC_HARDWARE_MODULE_ID),
            Err(DirectTextureError::Unsupported)
        ));
    }
}
