// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime self-test of the buffer storage path, run once the allocator device is open.

use std::os::raw::c_void;
use std::ptr;

use log::debug;

use crate::buffer::BufferHandle;
use crate::buffer::BufferUsage;
use crate::buffer::PixelFormat;
use crate::direct_texture_utils::*;
use crate::hal::AllocDevice;
use crate::hal::GrallocModule;

/// Checks that buffers from `device` are actually usable.  The error string becomes the
/// negotiation error reported to the user.
pub trait StorageProbe: Send + Sync {
    fn test_support(
        &mut self,
        module: &dyn GrallocModule,
        device: &dyn AllocDevice,
    ) -> Result<(), String>;
}

const TEST_BUFFER_SIZE: u32 = 64;

/// Allocates a small texture-capable buffer, maps it for writing and releases it again.
pub struct AllocLockProbe {
    format: PixelFormat,
}

impl Default for AllocLockProbe {
    fn default() -> AllocLockProbe {
        AllocLockProbe {
            format: PixelFormat::RGB_565,
        }
    }
}

impl AllocLockProbe {
    /// Probe using test buffers of `format`.
    pub fn new(format: PixelFormat) -> AllocLockProbe {
        AllocLockProbe { format }
    }

    fn lock_cycle(&self, module: &dyn GrallocModule, handle: BufferHandle) -> Result<(), String> {
        let usage = BufferUsage::empty().use_sw_write(true);
        let mut data: *mut c_void = ptr::null_mut();
        let ret = module.lock(
            handle,
            usage,
            LockRect::full(TEST_BUFFER_SIZE, TEST_BUFFER_SIZE),
            &mut data,
        );
        if ret != HAL_OK {
            return Err(format!("Can't lock test buffer ({})", ret));
        }

        let mapped = !data.is_null();
        let ret = module.unlock(handle);
        if !mapped {
            return Err("Test buffer lock returned no data".to_string());
        }
        if ret != HAL_OK {
            return Err(format!("Can't unlock test buffer ({})", ret));
        }
        Ok(())
    }
}

impl StorageProbe for AllocLockProbe {
    fn test_support(
        &mut self,
        module: &dyn GrallocModule,
        device: &dyn AllocDevice,
    ) -> Result<(), String> {
        let usage = BufferUsage::empty().use_sw_write(true).use_texturing(true);
        let mut handle = BufferHandle::null();
        let mut stride = 0;
        let ret = device.alloc(
            TEST_BUFFER_SIZE,
            TEST_BUFFER_SIZE,
            self.format,
            usage,
            &mut handle,
            &mut stride,
        );
        if ret != HAL_OK {
            return Err(format!("Can't allocate test buffer ({})", ret));
        }
        debug!("test buffer {:?} stride {}", handle, stride);

        let result = if stride < TEST_BUFFER_SIZE as i32 {
            Err(format!("Invalid test buffer stride {}", stride))
        } else {
            self.lock_cycle(module, handle)
        };

        // The storage is released whatever the outcome; a missing free() is not a failure.
        if let Some(ret) = device.free(handle) {
            if ret != HAL_OK && result.is_ok() {
                return Err(format!("Can't free test buffer ({})", ret));
            }
        }
        result
    }
}
