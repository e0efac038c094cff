//! Handle and memory operations on a target process.

use core::ffi::c_void;
use std::mem::size_of;
use std::ptr::null;

use log::debug;
use ntapi::ntpsapi::{
    NtQueryInformationProcess, ProcessBasicInformation, PROCESS_BASIC_INFORMATION,
};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows_sys::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows_sys::Win32::System::Memory::{
    VirtualAllocEx, VirtualFreeEx, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};
use windows_sys::Win32::System::Threading::{
    OpenProcess, PROCESS_CREATE_THREAD, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
    PROCESS_VM_READ, PROCESS_VM_WRITE,
};

use crate::memory::ProcessMemory;
use crate::{error::RemodError, Result};

/// Access required to walk the target's loader records and read its
/// images.
pub const INSPECT_ACCESS: u32 = PROCESS_QUERY_INFORMATION | PROCESS_VM_READ;

/// Access required for the full load/unload pipeline: everything
/// inspection needs plus staging memory and creating the remote thread.
pub const INVOKE_ACCESS: u32 = PROCESS_CREATE_THREAD
    | PROCESS_QUERY_INFORMATION
    | PROCESS_VM_OPERATION
    | PROCESS_VM_READ
    | PROCESS_VM_WRITE;

/// An open handle to a target process.
///
/// The handle is closed when the value drops, on error paths included.
pub struct RemoteProcess {
    handle: HANDLE,
    pid: u32,
}

impl RemoteProcess {
    /// Opens the process identified by `pid` with exactly `access_mask`.
    pub fn open(pid: u32, access_mask: u32) -> Result<Self> {
        let handle = unsafe { OpenProcess(access_mask, 0, pid) };
        if handle.is_null() {
            return Err(RemodError::ProcessOpen(pid, unsafe { GetLastError() }));
        }

        debug!("opened process {pid}, handle {handle:?}");
        Ok(Self { handle, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn handle(&self) -> HANDLE {
        self.handle
    }

    /// Queries the address of the target's process environment block.
    pub fn peb_address(&self) -> Result<u64> {
        let mut info: PROCESS_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
        let mut returned = 0u32;

        let status = unsafe {
            NtQueryInformationProcess(
                self.handle.cast(),
                ProcessBasicInformation,
                &mut info as *mut _ as *mut _,
                size_of::<PROCESS_BASIC_INFORMATION>() as u32,
                &mut returned,
            )
        };
        if status < 0 {
            return Err(RemodError::ProcessQuery(status));
        }
        if info.PebBaseAddress.is_null() {
            return Err(RemodError::PebUnavailable);
        }

        let peb = info.PebBaseAddress as u64;
        debug!("process {} environment block at {peb:#x}", self.pid);
        Ok(peb)
    }

    /// Writes `bytes` into the target at `address`; short writes fail.
    pub fn write_memory(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let mut written = 0usize;
        let ok = unsafe {
            WriteProcessMemory(
                self.handle,
                address as *const c_void,
                bytes.as_ptr().cast(),
                bytes.len(),
                &mut written,
            )
        };
        if ok == 0 || written != bytes.len() {
            return Err(RemodError::RemoteWrite(address, bytes.len(), unsafe {
                GetLastError()
            }));
        }
        Ok(())
    }

    /// Commits a read/write region of `size` bytes in the target.
    ///
    /// The region is released when the returned value drops.
    pub fn allocate(&self, size: usize) -> Result<RemoteAllocation<'_>> {
        let base = unsafe {
            VirtualAllocEx(
                self.handle,
                null(),
                size,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };
        if base.is_null() {
            return Err(RemodError::RemoteAlloc(size, unsafe { GetLastError() }));
        }

        debug!("allocated {size} bytes at {:#x} in process {}", base as u64, self.pid);
        Ok(RemoteAllocation {
            process: self,
            base: base as u64,
        })
    }
}

impl ProcessMemory for RemoteProcess {
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let mut read = 0usize;
        let ok = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buf.as_mut_ptr().cast(),
                buf.len(),
                &mut read,
            )
        };
        if ok == 0 || read != buf.len() {
            return Err(RemodError::RemoteRead(address, buf.len(), unsafe {
                GetLastError()
            }));
        }
        Ok(())
    }
}

impl Drop for RemoteProcess {
    fn drop(&mut self) {
        debug!("closing handle to process {}", self.pid);
        unsafe { CloseHandle(self.handle) };
    }
}

/// A committed region in the target's address space, released on drop.
pub struct RemoteAllocation<'a> {
    process: &'a RemoteProcess,
    base: u64,
}

impl RemoteAllocation<'_> {
    pub fn base(&self) -> u64 {
        self.base
    }
}

impl Drop for RemoteAllocation<'_> {
    fn drop(&mut self) {
        unsafe {
            VirtualFreeEx(
                self.process.handle,
                self.base as *mut c_void,
                0,
                MEM_RELEASE,
            )
        };
    }
}
