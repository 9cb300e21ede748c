// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Native graphics buffers and the gralloc usage/format vocabulary used to describe them.

use std::os::raw::c_void;
use std::ptr;

use crate::direct_texture_utils::*;

/*
 * Usage bits are the gralloc ones.  The SW read/write fields are two-bit values inside a
 * nibble-wide mask, so setting "often" replaces whatever the field held before.
 */
const GRALLOC_USAGE_SW_READ_OFTEN: u32 = 0x0000_0003;
const GRALLOC_USAGE_SW_READ_MASK: u32 = 0x0000_000f;
const GRALLOC_USAGE_SW_WRITE_OFTEN: u32 = 0x0000_0030;
const GRALLOC_USAGE_SW_WRITE_MASK: u32 = 0x0000_00f0;
const GRALLOC_USAGE_HW_TEXTURE: u32 = 0x0000_0100;
const GRALLOC_USAGE_HW_RENDER: u32 = 0x0000_0200;

/// Usage flags for allocating or locking a native buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    /// Returns empty set of flags.
    #[inline(always)]
    pub fn empty() -> BufferUsage {
        BufferUsage(0)
    }

    /// Wraps raw gralloc usage bits.
    #[inline(always)]
    pub fn new(raw: u32) -> BufferUsage {
        BufferUsage(raw)
    }

    /// Sets the "CPU reads often" field.
    #[inline(always)]
    pub fn use_sw_read(self, e: bool) -> BufferUsage {
        let cleared = self.0 & !GRALLOC_USAGE_SW_READ_MASK;
        if e {
            BufferUsage(cleared | GRALLOC_USAGE_SW_READ_OFTEN)
        } else {
            BufferUsage(cleared)
        }
    }

    /// Sets the "CPU writes often" field.
    #[inline(always)]
    pub fn use_sw_write(self, e: bool) -> BufferUsage {
        let cleared = self.0 & !GRALLOC_USAGE_SW_WRITE_MASK;
        if e {
            BufferUsage(cleared | GRALLOC_USAGE_SW_WRITE_OFTEN)
        } else {
            BufferUsage(cleared)
        }
    }

    /// Sets the texturing flag's presence.
    #[inline(always)]
    pub fn use_texturing(self, e: bool) -> BufferUsage {
        if e {
            BufferUsage(self.0 | GRALLOC_USAGE_HW_TEXTURE)
        } else {
            BufferUsage(self.0 & !GRALLOC_USAGE_HW_TEXTURE)
        }
    }

    /// Sets the rendering flag's presence.
    #[inline(always)]
    pub fn use_rendering(self, e: bool) -> BufferUsage {
        if e {
            BufferUsage(self.0 | GRALLOC_USAGE_HW_RENDER)
        } else {
            BufferUsage(self.0 & !GRALLOC_USAGE_HW_RENDER)
        }
    }

    /// Returns true if the CPU will map the buffer.
    #[inline(always)]
    pub fn host_visible(self) -> bool {
        self.0 & (GRALLOC_USAGE_SW_READ_MASK | GRALLOC_USAGE_SW_WRITE_MASK) != 0
    }

    /// Returns true if the texturing flag is set.
    #[inline(always)]
    pub fn uses_texturing(self) -> bool {
        self.0 & GRALLOC_USAGE_HW_TEXTURE != 0
    }
}

/// HAL pixel format of a native buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
    pub const RGBA_8888: PixelFormat = PixelFormat(1);
    pub const RGBX_8888: PixelFormat = PixelFormat(2);
    pub const RGB_888: PixelFormat = PixelFormat(3);
    pub const RGB_565: PixelFormat = PixelFormat(4);
    pub const BGRA_8888: PixelFormat = PixelFormat(5);

    /// Bytes per pixel for the formats above, `None` for anything vendor specific.
    pub fn bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::RGBA_8888 | PixelFormat::RGBX_8888 | PixelFormat::BGRA_8888 => Some(4),
            PixelFormat::RGB_888 => Some(3),
            PixelFormat::RGB_565 => Some(2),
            _ => None,
        }
    }
}

/// Opaque native handle (`buffer_handle_t`) produced by the allocator device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BufferHandle(*const c_void);

// The handle is an immutable token owned by the allocator; passing it between threads is how
// gralloc is meant to be used.
unsafe impl Send for BufferHandle {}
unsafe impl Sync for BufferHandle {}

impl BufferHandle {
    pub fn null() -> BufferHandle {
        BufferHandle(ptr::null())
    }

    /// Wraps a raw `buffer_handle_t`.
    pub fn from_raw(raw: *const c_void) -> BufferHandle {
        BufferHandle(raw)
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl Default for BufferHandle {
    fn default() -> BufferHandle {
        BufferHandle::null()
    }
}

/// Where a buffer is in its alloc -> (lock -> unlock)* -> free lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferState {
    Unallocated,
    Allocated,
    Locked,
    Freed,
}

/// A hardware buffer owned by the caller.  `DirectTexture` only mediates operations on it.
#[derive(Debug)]
pub struct NativeBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    usage: BufferUsage,
    handle: BufferHandle,
    stride: i32,
    state: BufferState,
}

impl NativeBuffer {
    /// Describes a buffer that has not been allocated yet.
    pub fn new(width: u32, height: u32, format: PixelFormat, usage: BufferUsage) -> NativeBuffer {
        NativeBuffer {
            width,
            height,
            format,
            usage,
            handle: BufferHandle::null(),
            stride: 0,
            state: BufferState::Unallocated,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Native handle, null until allocated and again after free.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Row length in pixels, as reported by the allocator.
    pub fn stride(&self) -> i32 {
        self.stride
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub(crate) fn expect_state(&self, op: &'static str, state: BufferState) -> DirectTextureResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(DirectTextureError::InvalidBufferState {
                op,
                state: self.state,
            })
        }
    }

    pub(crate) fn set_allocated(&mut self, handle: BufferHandle, stride: i32) {
        self.handle = handle;
        self.stride = stride;
        self.state = BufferState::Allocated;
    }

    pub(crate) fn set_state(&mut self, state: BufferState) {
        self.state = state;
    }

    pub(crate) fn set_freed(&mut self) {
        self.handle = BufferHandle::null();
        self.state = BufferState::Freed;
    }

    /// Ensures `rect` lies inside the buffer.
    pub(crate) fn check_rect(&self, rect: LockRect) -> DirectTextureResult<()> {
        let LockRect {
            left,
            top,
            width,
            height,
        } = rect;
        let buffer_width = self.width;
        let buffer_height = self.height;

        let right = checked_arithmetic!(left + width)?;
        let bottom = checked_arithmetic!(top + height)?;
        checked_range!(right <= buffer_width)?;
        checked_range!(bottom <= buffer_height)
    }
}
