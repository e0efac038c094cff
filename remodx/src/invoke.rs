//! One-shot execution of a resolved routine inside the target process.

use core::ffi::c_void;
use std::ptr::null;

use log::debug;
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, WAIT_FAILED};
use windows_sys::Win32::System::Threading::{
    CreateRemoteThread, GetExitCodeThread, WaitForSingleObject, INFINITE,
};

use crate::process::RemoteProcess;
use crate::{error::RemodError, Result};

/// Stack size for the remote thread.
const REMOTE_STACK_SIZE: usize = 1024 * 1024;

/// The single argument handed to the invoked routine.
pub enum Argument<'a> {
    /// Passed through as the parameter directly; used when the value is
    /// already meaningful in the target, e.g. a module handle.
    Value(u64),
    /// Bytes staged into a fresh read/write region in the target first;
    /// the region's address becomes the parameter. Used when the routine
    /// expects a pointer valid in its own address space, e.g. a path
    /// string.
    Buffer(&'a [u8]),
}

struct ThreadGuard(HANDLE);

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

/// Runs the routine at `entry_address` in the target with one argument and
/// returns its raw exit value.
///
/// Creates a single thread in the target whose start address is the
/// resolved routine, blocks until it terminates, and reads its exit
/// status. The exit value is not interpreted here; the load/unload
/// routines both use zero to signal failure and the caller applies that
/// convention. In buffer mode the staging allocation and write happen
/// before any thread exists, and the region is released once the thread
/// has exited.
///
/// There is no timeout on the wait: a routine that never returns hangs
/// the calling tool. There is also no cancellation once the remote thread
/// has been created.
pub fn invoke(process: &RemoteProcess, entry_address: u64, argument: Argument<'_>) -> Result<u32> {
    let staged;
    let parameter = match argument {
        Argument::Value(value) => {
            staged = None;
            value
        }
        Argument::Buffer(bytes) => {
            let allocation = process.allocate(bytes.len())?;
            process.write_memory(allocation.base(), bytes)?;
            debug!(
                "staged {} argument bytes at {:#x}",
                bytes.len(),
                allocation.base()
            );
            let base = allocation.base();
            staged = Some(allocation);
            base
        }
    };

    let start: unsafe extern "system" fn(*mut c_void) -> u32 =
        unsafe { std::mem::transmute(entry_address as usize) };
    let mut thread_id = 0u32;
    let thread = unsafe {
        CreateRemoteThread(
            process.handle(),
            null(),
            REMOTE_STACK_SIZE,
            Some(start),
            parameter as *const c_void,
            0,
            &mut thread_id,
        )
    };
    if thread.is_null() {
        return Err(RemodError::ThreadCreate(unsafe { GetLastError() }));
    }
    let thread = ThreadGuard(thread);
    debug!("remote thread {thread_id} started at {entry_address:#x}");

    if unsafe { WaitForSingleObject(thread.0, INFINITE) } == WAIT_FAILED {
        return Err(RemodError::ThreadWait(unsafe { GetLastError() }));
    }

    let mut exit_code = 0u32;
    if unsafe { GetExitCodeThread(thread.0, &mut exit_code) } == 0 {
        return Err(RemodError::ExitCodeRead(unsafe { GetLastError() }));
    }

    debug!("remote thread {thread_id} exited with {exit_code:#x}");
    drop(staged);
    Ok(exit_code)
}
