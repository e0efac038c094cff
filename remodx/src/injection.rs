//! Load and unload pipelines: two configurations of the same engine.
//!
//! Both drive the target's own loader by resolving a routine inside its
//! `kernel32.dll` and running it on a remote thread. Loading calls
//! `LoadLibraryW` with a staged path string; unloading calls `FreeLibrary`
//! with the module's own base address, which doubles as its handle.

use std::iter::once;

use log::info;

use crate::invoke::{self, Argument};
use crate::loader::{self, ModuleRecord};
use crate::pe;
use crate::privilege;
use crate::process::{RemoteProcess, INVOKE_ACCESS};
use crate::{error::RemodError, Result};

/// The module that hosts the loader entry points in every normal process.
const KERNEL32: &str = "kernel32.dll";

const LOAD_ROUTINE: &str = "LoadLibraryW";
const UNLOAD_ROUTINE: &str = "FreeLibrary";

/// Loads the module at `dll_path` into the process identified by `pid`.
///
/// `dll_path` must be meaningful inside the target, so callers pass a
/// fully qualified path. The path is staged into the target as a
/// NUL-terminated UTF-16 string and handed to `LoadLibraryW` on a remote
/// thread; a zero exit value means the target's loader rejected the
/// module.
pub fn inject_dll(pid: u32, dll_path: &str) -> Result<()> {
    privilege::enable(privilege::SE_DEBUG)?;
    let process = RemoteProcess::open(pid, INVOKE_ACCESS)?;
    let peb = process.peb_address()?;

    let kernel32 = loader::find_module(&process, peb, KERNEL32)?;
    info!("{KERNEL32} at {:#x} in process {pid}", kernel32.base);
    let load_library = pe::resolve_export(&process, kernel32.base, LOAD_ROUTINE)?;

    let argument: Vec<u8> = dll_path
        .encode_utf16()
        .chain(once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    let exit = invoke::invoke(&process, load_library, Argument::Buffer(&argument))?;
    if exit == 0 {
        return Err(RemodError::RemoteRoutineFailed(LOAD_ROUTINE));
    }

    info!("{LOAD_ROUTINE} returned {exit:#x} in process {pid}");
    Ok(())
}

/// Unloads the module named `module_name` from the process identified by
/// `pid`, returning a copy of its loader record.
///
/// The record located during the walk supplies the module handle that
/// `FreeLibrary` takes; a zero exit value means the target's loader
/// refused to release it. A module loaded more than once only has its
/// reference count decremented and stays resident.
pub fn eject_dll(pid: u32, module_name: &str) -> Result<ModuleRecord> {
    privilege::enable(privilege::SE_DEBUG)?;
    let process = RemoteProcess::open(pid, INVOKE_ACCESS)?;
    let peb = process.peb_address()?;

    let module = loader::find_module(&process, peb, module_name)?;
    info!(
        "found {} at {:#x} in process {pid}",
        module.base_name, module.base
    );

    let kernel32 = loader::find_module(&process, peb, KERNEL32)?;
    let free_library = pe::resolve_export(&process, kernel32.base, UNLOAD_ROUTINE)?;

    let exit = invoke::invoke(&process, free_library, Argument::Value(module.base))?;
    if exit == 0 {
        return Err(RemodError::RemoteRoutineFailed(UNLOAD_ROUTINE));
    }

    info!("{UNLOAD_ROUTINE} returned {exit:#x} in process {pid}");
    Ok(module)
}
