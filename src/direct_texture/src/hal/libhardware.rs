// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! libhardware: the Android HAL backend.  `libhardware.so` is opened at runtime with
//! `libloading`, `hw_get_module` locates the gralloc module and `gralloc_open` yields its
//! allocator device.
//!
//! Only the leading fields of the HAL structs are declared; they are never constructed on the
//! Rust side, only read through pointers handed out by the HAL.

#![cfg(feature = "libhardware")]

use std::ffi::CString;
use std::os::raw::c_char;
use std::os::raw::c_int;
use std::os::raw::c_void;
use std::ptr;
use std::sync::Arc;

use libloading::Library;
use libloading::Symbol;
use log::debug;

use crate::buffer::BufferHandle;
use crate::buffer::BufferUsage;
use crate::buffer::PixelFormat;
use crate::direct_texture_utils::*;
use crate::hal::AllocDevice;
use crate::hal::GrallocModule;
use crate::hal::HalLoader;

const GRALLOC_HARDWARE_GPU0: &[u8] = b"gpu0\0";

#[allow(non_camel_case_types)]
type buffer_handle_t = *const c_void;

#[repr(C)]
#[allow(non_camel_case_types, dead_code)]
struct hw_module_methods_t {
    open: Option<
        unsafe extern "C" fn(*const hw_module_t, *const c_char, *mut *mut hw_device_t) -> c_int,
    >,
}

#[repr(C)]
#[allow(non_camel_case_types, dead_code)]
struct hw_module_t {
    tag: u32,
    module_api_version: u16,
    hal_api_version: u16,
    id: *const c_char,
    name: *const c_char,
    author: *const c_char,
    methods: *mut hw_module_methods_t,
    dso: *mut c_void,
    // uint32_t on 32-bit, uint64_t on LP64.
    reserved: [usize; 25],
}

#[repr(C)]
#[allow(non_camel_case_types, dead_code)]
struct hw_device_t {
    tag: u32,
    version: u32,
    module: *mut hw_module_t,
    reserved: [usize; 12],
    close: Option<unsafe extern "C" fn(*mut hw_device_t) -> c_int>,
}

#[repr(C)]
#[allow(non_camel_case_types, dead_code)]
struct gralloc_module_t {
    common: hw_module_t,
    register_buffer: Option<unsafe extern "C" fn(*const gralloc_module_t, buffer_handle_t) -> c_int>,
    unregister_buffer:
        Option<unsafe extern "C" fn(*const gralloc_module_t, buffer_handle_t) -> c_int>,
    lock: Option<
        unsafe extern "C" fn(
            *const gralloc_module_t,
            buffer_handle_t,
            c_int,
            c_int,
            c_int,
            c_int,
            c_int,
            *mut *mut c_void,
        ) -> c_int,
    >,
    unlock: Option<unsafe extern "C" fn(*const gralloc_module_t, buffer_handle_t) -> c_int>,
}

#[repr(C)]
#[allow(non_camel_case_types, dead_code)]
struct alloc_device_t {
    common: hw_device_t,
    alloc: Option<
        unsafe extern "C" fn(
            *mut alloc_device_t,
            c_int,
            c_int,
            c_int,
            c_int,
            *mut buffer_handle_t,
            *mut c_int,
        ) -> c_int,
    >,
    free: Option<unsafe extern "C" fn(*mut alloc_device_t, buffer_handle_t) -> c_int>,
}

type HwGetModule = unsafe extern "C" fn(*const c_char, *mut *const hw_module_t) -> c_int;

/// Loads gralloc through `libhardware.so`.
pub struct LibhardwareLoader {
    path: String,
    library: Option<Arc<Library>>,
}

impl LibhardwareLoader {
    pub fn new<S: Into<String>>(path: S) -> LibhardwareLoader {
        LibhardwareLoader {
            path: path.into(),
            library: None,
        }
    }

    fn library(&mut self) -> DirectTextureResult<Arc<Library>> {
        if let Some(library) = &self.library {
            return Ok(library.clone());
        }

        // libhardware has no initialization routines with side effects beyond the module
        // registry it manages.
        let library = unsafe { Library::new(&self.path) }.map_err(DirectTextureError::LibraryLoad)?;
        let library = Arc::new(library);
        self.library = Some(library.clone());
        Ok(library)
    }
}

impl HalLoader for LibhardwareLoader {
    fn open_module(&mut self, id: &str) -> DirectTextureResult<Box<dyn GrallocModule>> {
        let library = self.library()?;

        // Safe because the symbol type matches the declaration in hardware/hardware.h, and the
        // copied function pointer is only used while `library` is alive.
        let hw_get_module: HwGetModule = unsafe {
            let symbol: Symbol<HwGetModule> = library.get(b"hw_get_module\0").map_err(|e| {
                debug!("{} has no hw_get_module: {}", self.path, e);
                DirectTextureError::MissingSymbol("hw_get_module")
            })?;
            *symbol
        };

        let id = CString::new(id)?;
        let mut module: *const hw_module_t = ptr::null();
        // Safe because `id` is a valid C string and `module` is a valid out pointer.
        let ret = unsafe { hw_get_module(id.as_ptr(), &mut module) };
        if ret != HAL_OK || module.is_null() {
            return Err(DirectTextureError::ModuleNotFound(ret));
        }
        debug!("gralloc module @ {:p}", module);

        Ok(Box::new(LibhardwareModule {
            module: module as *const gralloc_module_t,
            library,
        }))
    }
}

/// The gralloc module.  Keeps the library mapped for as long as it lives.
struct LibhardwareModule {
    module: *const gralloc_module_t,
    library: Arc<Library>,
}

// Safe because HAL modules are process-wide, immutable after load, and gralloc entry points are
// required to be thread-safe.
unsafe impl Send for LibhardwareModule {}
unsafe impl Sync for LibhardwareModule {}

impl GrallocModule for LibhardwareModule {
    fn open_alloc_device(&self) -> DirectTextureResult<Box<dyn AllocDevice>> {
        // Safe because `module` was returned by hw_get_module and stays valid while the library
        // is loaded.
        let open = unsafe {
            let methods = (*self.module).common.methods;
            if methods.is_null() {
                return Err(DirectTextureError::MissingSymbol("open"));
            }
            (*methods).open
        }
        .ok_or(DirectTextureError::MissingSymbol("open"))?;

        let mut device: *mut hw_device_t = ptr::null_mut();
        // This is gralloc_open().
        let ret = unsafe {
            open(
                &(*self.module).common,
                GRALLOC_HARDWARE_GPU0.as_ptr() as *const c_char,
                &mut device,
            )
        };
        hal_result("open", ret)?;
        if device.is_null() {
            return Err(DirectTextureError::NullDevice);
        }
        debug!("alloc device @ {:p}", device);

        Ok(Box::new(LibhardwareDevice {
            device: device as *mut alloc_device_t,
            _library: self.library.clone(),
        }))
    }

    fn lock(
        &self,
        handle: BufferHandle,
        usage: BufferUsage,
        rect: LockRect,
        vaddr: &mut *mut c_void,
    ) -> i32 {
        let (Ok(usage), Ok(l), Ok(t), Ok(w), Ok(h)) = (
            c_int::try_from(usage.0),
            c_int::try_from(rect.left),
            c_int::try_from(rect.top),
            c_int::try_from(rect.width),
            c_int::try_from(rect.height),
        ) else {
            return -libc::EINVAL;
        };

        // Safe because `module` is valid while the library is loaded.
        match unsafe { (*self.module).lock } {
            Some(lock) => unsafe { lock(self.module, handle.as_ptr(), usage, l, t, w, h, vaddr) },
            None => -libc::ENOSYS,
        }
    }

    fn unlock(&self, handle: BufferHandle) -> i32 {
        // Safe because `module` is valid while the library is loaded.
        match unsafe { (*self.module).unlock } {
            Some(unlock) => unsafe { unlock(self.module, handle.as_ptr()) },
            None => -libc::ENOSYS,
        }
    }
}

/// The allocator device.  Closed on drop.
struct LibhardwareDevice {
    device: *mut alloc_device_t,
    _library: Arc<Library>,
}

// Safe for the same reasons as `LibhardwareModule`.
unsafe impl Send for LibhardwareDevice {}
unsafe impl Sync for LibhardwareDevice {}

impl AllocDevice for LibhardwareDevice {
    fn alloc(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: BufferUsage,
        handle: &mut BufferHandle,
        stride: &mut i32,
    ) -> i32 {
        let (Ok(w), Ok(h), Ok(usage)) = (
            c_int::try_from(width),
            c_int::try_from(height),
            c_int::try_from(usage.0),
        ) else {
            return -libc::EINVAL;
        };

        let mut raw: buffer_handle_t = ptr::null();
        let mut raw_stride: c_int = 0;
        // Safe because `device` was opened by the module and is valid until closed in drop.
        let ret = match unsafe { (*self.device).alloc } {
            Some(alloc) => unsafe {
                alloc(self.device, w, h, format.0, usage, &mut raw, &mut raw_stride)
            },
            None => -libc::ENOSYS,
        };

        if ret == HAL_OK {
            *handle = BufferHandle::from_raw(raw);
            *stride = raw_stride;
        }
        ret
    }

    fn free(&self, handle: BufferHandle) -> Option<i32> {
        // Safe because `device` is valid until closed in drop.
        unsafe { (*self.device).free }.map(|free| unsafe { free(self.device, handle.as_ptr()) })
    }
}

impl Drop for LibhardwareDevice {
    fn drop(&mut self) {
        // This is gralloc_close().  Safe because `device` was opened by the module and is closed
        // exactly once.
        unsafe {
            if let Some(close) = (*self.device).common.close {
                close(self.device as *mut hw_device_t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported() {
        let mut loader = LibhardwareLoader::new("/nonexistent/libhardware.so");
        match loader.open_module(GRALLOC_HARDWARE_MODULE_ID) {
            Err(DirectTextureError::LibraryLoad(_)) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("loaded a module from a nonexistent library"),
        }
    }

    #[test]
    fn hal_struct_prefixes() {
        use std::mem::size_of;

        // 32 words in hw_module_t and 16 in hw_device_t, minus the header words.
        let word = size_of::<usize>();
        assert_eq!(size_of::<hw_device_t>(), 8 + word * 14);
        assert_eq!(size_of::<hw_module_t>(), 8 + word * 30);
    }
}
