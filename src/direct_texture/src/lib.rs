// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A crate for deciding whether hardware graphics buffers can be used as textures without a
//! CPU copy, and for driving the gralloc lifecycle of such buffers.

#[macro_use]
mod macros;
mod buffer;
mod direct_texture;
mod direct_texture_utils;
mod hal;
mod policy;
mod probe;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use crate::buffer::*;
pub use crate::direct_texture::has_extension;
pub use crate::direct_texture::DirectTexture;
pub use crate::direct_texture::DirectTextureBuilder;
pub use crate::direct_texture_utils::*;
pub use crate::hal::default_loader;
pub use crate::hal::AllocDevice;
pub use crate::hal::GrallocModule;
pub use crate::hal::HalHandles;
pub use crate::hal::HalLoader;
#[cfg(feature = "libhardware")]
pub use crate::hal::LibhardwareLoader;
#[cfg(not(feature = "libhardware"))]
pub use crate::hal::UnsupportedHal;
pub use crate::policy::*;
pub use crate::probe::AllocLockProbe;
pub use crate::probe::StorageProbe;
