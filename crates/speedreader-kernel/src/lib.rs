//! Thin safe wrapper around the ONNX Runtime C ABI.
//!
//! The native runtime is reached through the `ort` binding. This crate
//! narrows it to the three operations the rest of SpeedReader needs:
//! environment init, session creation from model bytes, and a single
//! `run(tensor) -> tensor` call - and enforces the tensor contracts (rank
//! and element-count validation, descriptive shape-mismatch errors) at the
//! boundary.
//!
//! Thread-safety: the native session is documented as thread-safe for
//! concurrent `run` calls. The Rust binding requires exclusive access, so the
//! session sits behind a mutex scoped to the single native call; callers must
//! bound concurrency upstream (the pinned pool does).

mod error;
mod session;
mod tensor;

pub use error::KernelError;
pub use session::{ensure_env, InferenceSession, SessionOptions};
pub use tensor::{TensorData, MAX_TENSOR_DIMS};
