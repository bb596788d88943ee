//! Threading marker traits shared by every bridge definition.
//!
//! Native hosts drive decoders, audio sinks and recorders from several tokio
//! tasks, so bridge objects must be `Send + Sync` there. A `wasm32` host runs
//! on one thread and hands out browser objects that are neither, so the bounds
//! collapse to nothing on that target.

/// `Send + Sync` on native targets, no bound on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSendSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSendSync for T where T: Send + Sync {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSendSync {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSendSync for T {}

/// `Send` on native targets, no bound on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub trait PlatformSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<T> PlatformSend for T where T: Send {}

#[cfg(target_arch = "wasm32")]
pub trait PlatformSend {}

#[cfg(target_arch = "wasm32")]
impl<T> PlatformSend for T {}
