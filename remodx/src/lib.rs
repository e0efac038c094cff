//! # remodx: remote module load/unload engine
//!
//! **remodx** drives a target process's own loader from the outside: it
//! walks the target's loaded-module records across the process boundary,
//! resolves named exports out of a module image in the target's address
//! space, and runs a resolved routine there on a one-shot remote thread.
//! Loading and unloading a DLL are two thin configurations of that engine.
//!
//! The engine is stateless between invocations and single-threaded from
//! the caller's perspective; every handle, staged allocation, and remote
//! thread belongs to one invocation and is released when it ends. Targets
//! must share the caller's pointer width (x86_64 only).

/// String matching (Knuth-Morris-Pratt) and case-blind comparisons.
pub mod pattern;

/// Error taxonomy for the engine.
pub mod error;

/// Remote-memory access trait and bounds-checked buffer parsing.
pub mod memory;

/// Loader-record walking.
pub mod loader;

/// Export-table resolution.
pub mod pe;

/// Process-by-name resolution.
pub mod lookup;

/// Target process handle and memory operations.
#[cfg(windows)]
pub mod process;

/// Privilege acquisition on the caller's token.
#[cfg(windows)]
pub mod privilege;

/// Remote routine invocation.
#[cfg(windows)]
pub mod invoke;

/// The load and unload pipelines.
#[cfg(windows)]
pub mod injection;

pub use error::{RemodError, Result};
pub use loader::{find_module, ModuleRecord};
pub use lookup::match_process;
pub use memory::{ByteView, ProcessMemory, ProcessMemoryExt};
pub use pe::{resolve_export, resolve_exports, RoutineRequest};

#[cfg(windows)]
pub use injection::{eject_dll, inject_dll};
#[cfg(windows)]
pub use invoke::{invoke, Argument};
#[cfg(windows)]
pub use lookup::find_process_by_name;
#[cfg(windows)]
pub use privilege::SE_DEBUG;
#[cfg(windows)]
pub use process::{RemoteAllocation, RemoteProcess, INSPECT_ACCESS, INVOKE_ACCESS};
