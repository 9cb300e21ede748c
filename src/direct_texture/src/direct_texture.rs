// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! direct_texture: decides once whether hardware buffers can be bound as textures without a
//! CPU copy, then mediates the lifecycle of those buffers.

use std::os::raw::c_void;
use std::ptr;

use log::debug;
use log::info;
use log::warn;

use crate::buffer::BufferHandle;
use crate::buffer::BufferState;
use crate::buffer::BufferUsage;
use crate::buffer::NativeBuffer;
use crate::direct_texture_utils::*;
use crate::hal::default_loader;
use crate::hal::AllocDevice;
use crate::hal::GrallocModule;
use crate::hal::HalHandles;
use crate::hal::HalLoader;
use crate::policy::GpuPolicy;
use crate::probe::AllocLockProbe;
use crate::probe::StorageProbe;

const BASIC_LIBHARDWARE_ERROR: &str = "Unsupported libhardware";

/// Returns true if `token` is one of the whitespace separated entries of `extensions`.
pub fn has_extension(extensions: &str, token: &str) -> bool {
    extensions.split_whitespace().any(|ext| ext == token)
}

/// Maps a module load failure to the message reported to the user.
fn module_load_message(verbose: bool, e: &DirectTextureError) -> &'static str {
    if !verbose {
        return BASIC_LIBHARDWARE_ERROR;
    }

    match e {
        #[cfg(feature = "libhardware")]
        DirectTextureError::LibraryLoad(_) => "Incompatible libhardware.so",
        DirectTextureError::MissingSymbol(_) => "Incompatible libhardware.so",
        DirectTextureError::Unsupported => BASIC_LIBHARDWARE_ERROR,
        _ => "Can't load gralloc module",
    }
}

/// Builds a `DirectTexture`.
pub struct DirectTextureBuilder {
    policy: GpuPolicy,
    required_extension: String,
    module_id: String,
    library_path: String,
    verbose_errors: bool,
    default_enabled: bool,
    loader: Option<Box<dyn HalLoader>>,
    probe: Option<Box<dyn StorageProbe>>,
}

impl Default for DirectTextureBuilder {
    fn default() -> DirectTextureBuilder {
        DirectTextureBuilder::new()
    }
}

impl DirectTextureBuilder {
    /// Create a new DirectTextureBuilder with the built-in GPU tables and the platform HAL.
    pub fn new() -> DirectTextureBuilder {
        DirectTextureBuilder {
            policy: GpuPolicy::default(),
            required_extension: OES_EGL_IMAGE_EXTENSION.to_string(),
            module_id: GRALLOC_HARDWARE_MODULE_ID.to_string(),
            library_path: LIBHARDWARE_PATH.to_string(),
            verbose_errors: cfg!(debug_assertions),
            default_enabled: false,
            loader: None,
            probe: None,
        }
    }

    /// Replaces the GPU allow/deny tables.
    pub fn set_policy(mut self, policy: GpuPolicy) -> DirectTextureBuilder {
        self.policy = policy;
        self
    }

    /// Sets the extension token that must be advertised by the renderer.
    pub fn set_required_extension<S: Into<String>>(mut self, extension: S) -> DirectTextureBuilder {
        self.required_extension = extension.into();
        self
    }

    /// Sets the id of the HAL module to open.
    pub fn set_module_id<S: Into<String>>(mut self, module_id: S) -> DirectTextureBuilder {
        self.module_id = module_id.into();
        self
    }

    /// Sets the HAL library used by the default loader.
    pub fn set_library_path<S: Into<String>>(mut self, path: S) -> DirectTextureBuilder {
        self.library_path = path.into();
        self
    }

    /// Report which HAL step failed instead of a generic message.
    pub fn set_verbose_errors(mut self, v: bool) -> DirectTextureBuilder {
        self.verbose_errors = v;
        self
    }

    /// Whether direct textures start enabled on supported GPUs that are not allow-listed.
    pub fn set_default_enabled(mut self, v: bool) -> DirectTextureBuilder {
        self.default_enabled = v;
        self
    }

    /// Overrides the HAL loader.
    pub fn set_hal_loader(mut self, loader: Box<dyn HalLoader>) -> DirectTextureBuilder {
        self.loader = Some(loader);
        self
    }

    /// Overrides the storage self-test run at the end of negotiation.
    pub fn set_storage_probe(mut self, probe: Box<dyn StorageProbe>) -> DirectTextureBuilder {
        self.probe = Some(probe);
        self
    }

    /// Builds the capability object.  Nothing is probed until `DirectTexture::negotiate`.
    pub fn build(self) -> DirectTexture {
        let loader = match self.loader {
            Some(loader) => loader,
            None => default_loader(&self.library_path),
        };
        let probe = match self.probe {
            Some(probe) => probe,
            None => Box::new(AllocLockProbe::default()),
        };

        DirectTexture {
            policy: self.policy,
            required_extension: self.required_extension,
            module_id: self.module_id,
            verbose_errors: self.verbose_errors,
            default_enabled: self.default_enabled,
            loader,
            probe,
            negotiated: false,
            supported: false,
            whitelisted: false,
            enabled: false,
            last_error: None,
            hal: HalHandles::new(),
        }
    }
}

/// Capability state for the zero-copy texture path.
///
/// Built once by the rendering subsystem and passed by reference to whatever needs direct
/// buffers.  `negotiate` runs at most once; afterwards the object only answers queries and
/// forwards buffer operations to the HAL.
pub struct DirectTexture {
    policy: GpuPolicy,
    required_extension: String,
    module_id: String,
    verbose_errors: bool,
    default_enabled: bool,
    loader: Box<dyn HalLoader>,
    probe: Box<dyn StorageProbe>,
    negotiated: bool,
    supported: bool,
    whitelisted: bool,
    enabled: bool,
    last_error: Option<NegotiationError>,
    hal: HalHandles,
}

impl DirectTexture {
    /// Runs the negotiation against the renderer's extension list and name.  Only the first
    /// call does anything; later calls return the cached result.
    pub fn negotiate(&mut self, extensions: &str, renderer: &str) -> bool {
        if self.negotiated {
            debug!("direct texture support already negotiated");
            return self.supported;
        }
        self.negotiated = true;

        match self.run_negotiation(extensions, renderer) {
            Ok(hal) => {
                info!("direct textures work");
                self.hal = hal;
                self.supported = true;
                self.last_error = None;

                if self.policy.is_allowed(renderer) {
                    info!("enabling direct textures by default on white-listed hardware");
                    self.whitelisted = true;
                    self.enabled = true;
                } else {
                    self.enabled = self.default_enabled;
                }
            }
            Err(e) => {
                warn!("can't use direct textures: {}", e);
                self.last_error = Some(e);
            }
        }

        self.supported
    }

    /// The ordered negotiation steps.  Handles acquired so far are dropped on any early return.
    fn run_negotiation(
        &mut self,
        extensions: &str,
        renderer: &str,
    ) -> Result<HalHandles, NegotiationError> {
        // Probing is what breaks denied GPUs, so this goes first.
        if self.policy.is_denied(renderer) {
            info!("force-disabling direct textures due to GPU {:?}", renderer);
            return Err(NegotiationError::PolicyDenied);
        }

        info!("attempting to set up direct texture support");
        if !has_extension(extensions, &self.required_extension) {
            let extension = self
                .required_extension
                .strip_prefix("GL_")
                .unwrap_or(&self.required_extension)
                .to_string();
            return Err(NegotiationError::CapabilityMissing { extension });
        }

        let verbose = self.verbose_errors;
        let mut hal = HalHandles::new();

        let module = self.loader.open_module(&self.module_id).map_err(|e| {
            debug!("opening HAL module {:?} failed: {}", self.module_id, e);
            NegotiationError::ModuleLoadFailed(module_load_message(verbose, &e))
        })?;
        hal.attach_module(module);

        hal.open_device().map_err(|e| {
            debug!("opening allocator device failed: {}", e);
            NegotiationError::ModuleLoadFailed(if verbose {
                "Can't load allocator device"
            } else {
                BASIC_LIBHARDWARE_ERROR
            })
        })?;

        let (module, device) = hal
            .pair()
            .ok_or(NegotiationError::ModuleLoadFailed(BASIC_LIBHARDWARE_ERROR))?;
        self.probe
            .test_support(module, device)
            .map_err(NegotiationError::ProbeFailed)?;

        Ok(hal)
    }

    /// True once negotiation succeeded.  False before negotiation.
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// True if the GPU is on the allow table.
    pub fn is_whitelisted(&self) -> bool {
        self.whitelisted
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns direct textures on or off.  Stays off when unsupported.
    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on && self.supported;
    }

    pub fn is_negotiated(&self) -> bool {
        self.negotiated
    }

    /// Why negotiation failed, if it did.
    pub fn last_error(&self) -> Option<&NegotiationError> {
        self.last_error.as_ref()
    }

    /// Human readable failure reason; empty when there is none.
    pub fn last_error_message(&self) -> String {
        self.last_error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default()
    }

    pub fn has_module(&self) -> bool {
        self.hal.module().is_some()
    }

    pub fn has_device(&self) -> bool {
        self.hal.device().is_some()
    }

    /// Closes the allocator device and the module.  The context then reports itself as
    /// unsupported and disabled, and buffer operations return `Unsupported`.  Negotiation is
    /// not run again.  Safe to call repeatedly.
    pub fn release_handles(&mut self) {
        self.hal.release();
        self.supported = false;
        self.enabled = false;
    }

    fn module(&self) -> DirectTextureResult<&dyn GrallocModule> {
        if !self.supported {
            return Err(DirectTextureError::Unsupported);
        }
        self.hal.module().ok_or(DirectTextureError::Unsupported)
    }

    fn device(&self) -> DirectTextureResult<&dyn AllocDevice> {
        if !self.supported {
            return Err(DirectTextureError::Unsupported);
        }
        self.hal.device().ok_or(DirectTextureError::Unsupported)
    }

    /// Allocates native storage for `buf`, filling in its handle and stride.
    pub fn allocate(&self, buf: &mut NativeBuffer) -> DirectTextureResult<()> {
        let device = self.device()?;
        buf.expect_state("allocate", BufferState::Unallocated)?;

        let mut handle = BufferHandle::null();
        let mut stride = 0;
        let ret = device.alloc(
            buf.width(),
            buf.height(),
            buf.format(),
            buf.usage(),
            &mut handle,
            &mut stride,
        );
        hal_result("alloc", ret)?;

        buf.set_allocated(handle, stride);
        Ok(())
    }

    /// Maps `rect` of `buf` for CPU access.  The pointer is valid until `unlock`.
    pub fn lock(
        &self,
        buf: &mut NativeBuffer,
        usage: BufferUsage,
        rect: LockRect,
    ) -> DirectTextureResult<*mut c_void> {
        let module = self.module()?;
        buf.expect_state("lock", BufferState::Allocated)?;
        buf.check_rect(rect)?;

        let mut data: *mut c_void = ptr::null_mut();
        let ret = module.lock(buf.handle(), usage, rect, &mut data);
        hal_result("lock", ret)?;

        buf.set_state(BufferState::Locked);
        Ok(data)
    }

    /// Releases the mapping made by `lock`.
    pub fn unlock(&self, buf: &mut NativeBuffer) -> DirectTextureResult<()> {
        let module = self.module()?;
        buf.expect_state("unlock", BufferState::Locked)?;

        let ret = module.unlock(buf.handle());
        hal_result("unlock", ret)?;

        buf.set_state(BufferState::Allocated);
        Ok(())
    }

    /// Releases the native storage of `buf`.
    pub fn free(&self, buf: &mut NativeBuffer) -> DirectTextureResult<()> {
        let device = self.device()?;
        buf.expect_state("free", BufferState::Allocated)?;

        match device.free(buf.handle()) {
            Some(ret) => hal_result("free", ret)?,
            None => warn!("no native buffer free()"),
        }

        buf.set_freed();
        Ok(())
    }
}
