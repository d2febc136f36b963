//! Lets a wasm guest drive a host WebGPU implementation through flat `webgpu*` imports.
//!
//! The guest sees only integers and pointers into its own memory. [`GpuBridge`] decodes the
//! guest's structures, resolves its handles to host objects, forwards calls to a [`GpuBackend`]
//! and reports asynchronous results back through guest function-table callbacks.

pub mod backend;
pub use self::backend::{GpuBackend, HostError, HostErrorKind, HostFuture, HostObject};

mod bridge;
pub use self::bridge::{GpuBridge, STATUS_ERROR, STATUS_SUCCESS};

pub mod callback;

mod config;
pub use self::config::*;

pub mod decode;

mod dispatch;

pub mod enums;

pub mod layouts;

pub mod limits;

#[cfg(feature = "wasmtime")]
mod link;
#[cfg(feature = "wasmtime")]
pub use self::link::*;

pub mod records;

pub mod registry;

pub mod resources;
pub use self::resources::ResourceKind;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// The `u64` size value meaning "to the end of the buffer".
pub const WHOLE_SIZE: u64 = u64::MAX;
