// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Call-counting stub HAL for tests.  Every entry point bumps a counter shared with the test
//! through `StubHal::counters`, so tests can check which steps of the protocol ran.

use std::os::raw::c_void;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use crate::buffer::BufferHandle;
use crate::buffer::BufferUsage;
use crate::buffer::PixelFormat;
use crate::direct_texture_utils::*;
use crate::hal::AllocDevice;
use crate::hal::GrallocModule;
use crate::hal::HalLoader;
use crate::probe::StorageProbe;

/// How `StubHal::open_module` fails.
#[derive(Copy, Clone, Debug)]
pub enum StubModuleError {
    /// The library loads but lacks `hw_get_module`.
    Incompatible,
    /// `hw_get_module` returns the given status.
    NotFound(i32),
}

/// Behaviour of the stub.  The default succeeds everywhere.
#[derive(Clone, Debug)]
pub struct StubHalConfig {
    pub module_error: Option<StubModuleError>,
    pub null_device: bool,
    pub alloc_status: i32,
    pub lock_status: i32,
    pub unlock_status: i32,
    pub has_free: bool,
    pub free_status: i32,
    /// Stride reported by alloc; the buffer width when `None`.
    pub stride: Option<i32>,
}

impl Default for StubHalConfig {
    fn default() -> StubHalConfig {
        StubHalConfig {
            module_error: None,
            null_device: false,
            alloc_status: HAL_OK,
            lock_status: HAL_OK,
            unlock_status: HAL_OK,
            has_free: true,
            free_status: HAL_OK,
            stride: None,
        }
    }
}

/// Counters shared between the stub and the test.
#[derive(Default)]
pub struct StubCounters {
    open_module: AtomicUsize,
    open_device: AtomicUsize,
    alloc: AtomicUsize,
    lock: AtomicUsize,
    unlock: AtomicUsize,
    free: AtomicUsize,
    probe: AtomicUsize,
    failed_opens: AtomicUsize,
    releases: Mutex<Vec<&'static str>>,
}

impl StubCounters {
    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::SeqCst)
    }

    fn record_release(&self, what: &'static str) {
        match self.releases.lock() {
            Ok(mut releases) => releases.push(what),
            Err(poisoned) => poisoned.into_inner().push(what),
        }
    }

    fn releases(&self) -> Vec<&'static str> {
        match self.releases.lock() {
            Ok(releases) => releases.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn open_modules(&self) -> usize {
        self.open_module.load(Ordering::SeqCst)
    }

    pub fn open_devices(&self) -> usize {
        self.open_device.load(Ordering::SeqCst)
    }

    pub fn allocs(&self) -> usize {
        self.alloc.load(Ordering::SeqCst)
    }

    pub fn locks(&self) -> usize {
        self.lock.load(Ordering::SeqCst)
    }

    pub fn unlocks(&self) -> usize {
        self.unlock.load(Ordering::SeqCst)
    }

    pub fn frees(&self) -> usize {
        self.free.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probe.load(Ordering::SeqCst)
    }

    /// Every call made into the stub HAL or stub probe.
    pub fn total_calls(&self) -> usize {
        self.open_modules()
            + self.open_devices()
            + self.allocs()
            + self.locks()
            + self.unlocks()
            + self.frees()
            + self.probes()
    }

    /// Module or device opens that returned an error, so never produced a handle.
    pub fn failed_opens(&self) -> usize {
        self.failed_opens.load(Ordering::SeqCst)
    }

    pub fn modules_released(&self) -> usize {
        self.releases().iter().filter(|r| **r == "module").count()
    }

    pub fn devices_released(&self) -> usize {
        self.releases().iter().filter(|r| **r == "device").count()
    }

    /// Modules and devices still alive.
    pub fn live_handles(&self) -> usize {
        self.open_modules() + self.open_devices() - self.failed_opens() - self.releases().len()
    }

    /// True if the first device release happened before the first module release.
    pub fn device_released_before_module(&self) -> bool {
        let releases = self.releases();
        let device = releases.iter().position(|r| *r == "device");
        let module = releases.iter().position(|r| *r == "module");
        matches!((device, module), (Some(d), Some(m)) if d < m)
    }
}

/// A `HalLoader` whose behaviour is set by `StubHalConfig`.
pub struct StubHal {
    config: StubHalConfig,
    counters: Arc<StubCounters>,
}

impl StubHal {
    pub fn new(config: StubHalConfig) -> StubHal {
        StubHal {
            config,
            counters: Default::default(),
        }
    }

    /// Counters shared with every module and device this stub hands out.
    pub fn counters(&self) -> Arc<StubCounters> {
        self.counters.clone()
    }
}

impl HalLoader for StubHal {
    fn open_module(&mut self, _id: &str) -> DirectTextureResult<Box<dyn GrallocModule>> {
        StubCounters::bump(&self.counters.open_module);
        match self.config.module_error {
            Some(StubModuleError::Incompatible) => {
                StubCounters::bump(&self.counters.failed_opens);
                Err(DirectTextureError::MissingSymbol("hw_get_module"))
            }
            Some(StubModuleError::NotFound(code)) => {
                StubCounters::bump(&self.counters.failed_opens);
                Err(DirectTextureError::ModuleNotFound(code))
            }
            None => Ok(Box::new(StubModule {
                config: self.config.clone(),
                counters: self.counters.clone(),
                scratch: vec![0; 64].into_boxed_slice(),
            })),
        }
    }
}

struct StubModule {
    config: StubHalConfig,
    counters: Arc<StubCounters>,
    scratch: Box<[u8]>,
}

impl GrallocModule for StubModule {
    fn open_alloc_device(&self) -> DirectTextureResult<Box<dyn AllocDevice>> {
        StubCounters::bump(&self.counters.open_device);
        if self.config.null_device {
            StubCounters::bump(&self.counters.failed_opens);
            return Err(DirectTextureError::NullDevice);
        }
        Ok(Box::new(StubDevice {
            config: self.config.clone(),
            counters: self.counters.clone(),
        }))
    }

    fn lock(
        &self,
        _handle: BufferHandle,
        _usage: BufferUsage,
        _rect: LockRect,
        vaddr: &mut *mut c_void,
    ) -> i32 {
        StubCounters::bump(&self.counters.lock);
        if self.config.lock_status == HAL_OK {
            *vaddr = self.scratch.as_ptr() as *mut c_void;
        }
        self.config.lock_status
    }

    fn unlock(&self, _handle: BufferHandle) -> i32 {
        StubCounters::bump(&self.counters.unlock);
        self.config.unlock_status
    }
}

impl Drop for StubModule {
    fn drop(&mut self) {
        self.counters.record_release("module");
    }
}

struct StubDevice {
    config: StubHalConfig,
    counters: Arc<StubCounters>,
}

impl AllocDevice for StubDevice {
    fn alloc(
        &self,
        width: u32,
        _height: u32,
        _format: PixelFormat,
        _usage: BufferUsage,
        handle: &mut BufferHandle,
        stride: &mut i32,
    ) -> i32 {
        let n = StubCounters::bump(&self.counters.alloc);
        if self.config.alloc_status == HAL_OK {
            *handle = BufferHandle::from_raw((n + 1) as *const c_void);
            *stride = self.config.stride.unwrap_or(width as i32);
        }
        self.config.alloc_status
    }

    fn free(&self, _handle: BufferHandle) -> Option<i32> {
        if !self.config.has_free {
            return None;
        }
        StubCounters::bump(&self.counters.free);
        Some(self.config.free_status)
    }
}

impl Drop for StubDevice {
    fn drop(&mut self) {
        self.counters.record_release("device");
    }
}

/// A `StorageProbe` returning a fixed result and counting its calls.
pub struct StubProbe {
    result: Result<(), String>,
    counters: Arc<StubCounters>,
}

impl StubProbe {
    /// Shares `counters` with a `StubHal` so `total_calls` covers both.
    pub fn new(result: Result<(), String>, counters: Arc<StubCounters>) -> StubProbe {
        StubProbe { result, counters }
    }
}

impl StorageProbe for StubProbe {
    fn test_support(
        &mut self,
        _module: &dyn GrallocModule,
        _device: &dyn AllocDevice,
    ) -> Result<(), String> {
        StubCounters::bump(&self.counters.probe);
        self.result.clone()
    }
}
