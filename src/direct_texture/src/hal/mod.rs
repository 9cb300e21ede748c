// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The hardware abstraction layer boundary.  A `HalLoader` opens a gralloc module by its
//! well-known id, the module opens an allocator device, and the two together service buffer
//! requests.  Every buffer entry point returns the raw HAL status, where zero means success.
//!
//! <https://source.android.com/devices/graphics/arch-bq-gralloc>

mod libhardware;
mod unsupported;

use std::os::raw::c_void;

use crate::buffer::BufferHandle;
use crate::buffer::BufferUsage;
use crate::buffer::PixelFormat;
use crate::direct_texture_utils::*;

#[cfg(feature = "libhardware")]
pub use libhardware::LibhardwareLoader;
#[cfg(not(feature = "libhardware"))]
pub use unsupported::UnsupportedHal;

/// Opens HAL modules.
pub trait HalLoader: Send + Sync {
    /// Returns the module registered under `id`.  Errors distinguish a missing or incompatible
    /// library (`LibraryLoad`, `MissingSymbol`) from a failed module lookup (`ModuleNotFound`).
    fn open_module(&mut self, id: &str) -> DirectTextureResult<Box<dyn GrallocModule>>;
}

/// A loaded gralloc module.  Handles CPU mapping of buffers.
pub trait GrallocModule: Send + Sync {
    /// Opens the allocator device living inside this module.
    fn open_alloc_device(&self) -> DirectTextureResult<Box<dyn AllocDevice>>;

    /// Maps the `rect` region of `handle` for CPU access.  On success `vaddr` holds a pointer
    /// valid until the matching `unlock`.
    fn lock(
        &self,
        handle: BufferHandle,
        usage: BufferUsage,
        rect: LockRect,
        vaddr: &mut *mut c_void,
    ) -> i32;

    /// Releases the mapping created by `lock`.
    fn unlock(&self, handle: BufferHandle) -> i32;
}

/// The allocator device of a gralloc module.
pub trait AllocDevice: Send + Sync {
    /// Allocates native storage, filling `handle` and `stride` on success.
    fn alloc(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
        handle: &mut BufferHandle,
        stride: &mut i32,
    ) -> i32;

    /// Releases native storage.  Returns `None` when the device has no free entry point, which
    /// the gralloc contract allows.
    fn free(&self, handle: BufferHandle) -> Option<i32>;
}

/// Exclusive owner of a gralloc module and of the allocator device opened from it.
///
/// A device can only be obtained from the module already held here, so a device never
/// exists without its module.  Releasing drops the device first.
#[derive(Default)]
pub struct HalHandles {
    device: Option<Box<dyn AllocDevice>>,
    module: Option<Box<dyn GrallocModule>>,
}

impl HalHandles {
    pub fn new() -> HalHandles {
        Default::default()
    }

    /// Takes ownership of `module`, releasing anything held before.
    pub fn attach_module(&mut self, module: Box<dyn GrallocModule>) {
        self.release();
        self.module = Some(module);
    }

    /// Opens the allocator device of the held module.
    pub fn open_device(&mut self) -> DirectTextureResult<()> {
        let module = self.module.as_ref().ok_or(DirectTextureError::Unsupported)?;
        let device = module.open_alloc_device()?;
        self.device = Some(device);
        Ok(())
    }

    pub fn module(&self) -> Option<&dyn GrallocModule> {
        self.module.as_deref()
    }

    pub fn device(&self) -> Option<&dyn AllocDevice> {
        self.device.as_deref()
    }

    /// Both handles, once the device is open.
    pub fn pair(&self) -> Option<(&dyn GrallocModule, &dyn AllocDevice)> {
        Some((self.module()?, self.device()?))
    }

    /// Drops the device, then the module.  Safe to call any number of times.
    pub fn release(&mut self) {
        self.device = None;
        self.module = None;
    }
}

impl Drop for HalHandles {
    fn drop(&mut self) {
        self.release();
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "libhardware")] {
        /// Returns the loader for the platform HAL library at `library_path`.
        pub fn default_loader(library_path: &str) -> Box<dyn HalLoader> {
            Box::new(LibhardwareLoader::new(library_path))
        }
    } else {
        /// The HAL backend was compiled out: every negotiation reports the path as unsupported.
        pub fn default_loader(_library_path: &str) -> Box<dyn HalLoader> {
            Box::new(UnsupportedHal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn device_requires_module() {
        let mut hal = HalHandles::new();
        assert!(matches!(
            hal.open_device(),
            Err(DirectTextureError::Unsupported)
        ));
        assert!(hal.device().is_none());
    }

    #[test]
    fn release_drops_device_before_module() {
        let mut loader = StubHal::new(StubHalConfig::default());
        let counters = loader.counters();

        let mut hal = HalHandles::new();
        hal.attach_module(loader.open_module(GRALLOC_HARDWARE_MODULE_ID).unwrap());
        hal.open_device().unwrap();
        assert!(hal.pair().is_some());

        hal.release();
        assert!(hal.pair().is_none());
        assert_eq!(counters.devices_released(), 1);
        assert_eq!(counters.modules_released(), 1);
        assert!(counters.device_released_before_module());

        hal.release();
        assert_eq!(counters.devices_released(), 1);
        assert_eq!(counters.modules_released(), 1);
    }

    #[test]
    fn null_device_keeps_module() {
        let mut loader = StubHal::new(StubHalConfig {
            null_device: true,
            ..Default::default()
        });

        let mut hal = HalHandles::new();
        hal.attach_module(loader.open_module(GRALLOC_HARDWARE_MODULE_ID).unwrap());
        assert!(matches!(
            hal.open_device(),
            Err(DirectTextureError::NullDevice)
        ));
        assert!(hal.module().is_some());
        assert!(hal.device().is_none());
    }
}
