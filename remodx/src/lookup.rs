//! Resolves a process id from an executable name.

use crate::pattern;
#[cfg(windows)]
use crate::{error::RemodError, Result};

/// One entry from a process enumeration snapshot.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub pid: u32,
    pub exe_name: String,
}

/// Returns the pid of the first entry whose executable name contains
/// `exe_name`, case-blind.
///
/// The match is a substring search so `note` finds `notepad.exe`. When
/// several processes share a name the first one in enumeration order
/// wins; callers that need a specific instance pass a pid instead.
pub fn match_process<I>(entries: I, exe_name: &str) -> Option<u32>
where
    I: IntoIterator<Item = ProcessEntry>,
{
    let folded: Vec<u8> = exe_name.bytes().map(|b| b.to_ascii_uppercase()).collect();
    let table = pattern::failure_table(&folded);

    entries
        .into_iter()
        .find(|entry| pattern::search(entry.exe_name.as_bytes(), &folded, &table, true).is_some())
        .map(|entry| entry.pid)
}

/// Snapshots the running processes and resolves `exe_name` to a pid.
#[cfg(windows)]
pub fn find_process_by_name(exe_name: &str) -> Result<u32> {
    use std::mem::size_of;

    use log::debug;
    use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };

    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) };
    if snapshot == INVALID_HANDLE_VALUE {
        return Err(RemodError::Snapshot(unsafe { GetLastError() }));
    }

    let mut entries = Vec::new();
    let mut raw: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
    raw.dwSize = size_of::<PROCESSENTRY32W>() as u32;

    if unsafe { Process32FirstW(snapshot, &mut raw) } != 0 {
        loop {
            let len = raw
                .szExeFile
                .iter()
                .position(|&u| u == 0)
                .unwrap_or(raw.szExeFile.len());
            entries.push(ProcessEntry {
                pid: raw.th32ProcessID,
                exe_name: String::from_utf16_lossy(&raw.szExeFile[..len]),
            });

            if unsafe { Process32NextW(snapshot, &mut raw) } == 0 {
                break;
            }
        }
    }
    unsafe { CloseHandle(snapshot) };

    debug!("snapshot holds {} processes", entries.len());
    match_process(entries, exe_name)
        .ok_or_else(|| RemodError::ProcessNotFound(exe_name.to_string()))
}
