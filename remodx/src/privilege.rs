//! Enables a named privilege on the caller's own access token.

use std::iter::once;
use std::mem::size_of;
use std::ptr::{null, null_mut};

use log::{debug, info};
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use crate::{error::RemodError, Result};

/// The privilege that grants access to other processes' internals.
pub const SE_DEBUG: &str = "SeDebugPrivilege";

struct TokenGuard(HANDLE);

impl Drop for TokenGuard {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.0) };
    }
}

/// Enables `privilege_name` on the calling process's token.
///
/// Expects one of the system-defined privilege names, e.g.
/// [`SE_DEBUG`]. The name is looked up to its LUID and set to the enabled
/// attribute. An adjustment the system accepts but does not apply (the
/// caller cannot hold the privilege at all) is reported as failure; none
/// of the remote operations are possible without it, so there is no
/// retry.
pub fn enable(privilege_name: &str) -> Result<()> {
    let mut token: HANDLE = null_mut();
    if unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    } == 0
    {
        return Err(RemodError::Privilege(privilege_name.to_string(), unsafe {
            GetLastError()
        }));
    }
    let token = TokenGuard(token);

    // Privileges are manipulated by LUID internally.
    let wide: Vec<u16> = privilege_name.encode_utf16().chain(once(0)).collect();
    let mut luid = LUID {
        LowPart: 0,
        HighPart: 0,
    };
    if unsafe { LookupPrivilegeValueW(null(), wide.as_ptr(), &mut luid) } == 0 {
        return Err(RemodError::Privilege(privilege_name.to_string(), unsafe {
            GetLastError()
        }));
    }

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    if unsafe {
        AdjustTokenPrivileges(
            token.0,
            0,
            &privileges,
            size_of::<TOKEN_PRIVILEGES>() as u32,
            null_mut(),
            null_mut(),
        )
    } == 0
    {
        return Err(RemodError::Privilege(privilege_name.to_string(), unsafe {
            GetLastError()
        }));
    }

    // The adjustment call reports success even when nothing was assigned.
    let code = unsafe { GetLastError() };
    if code == ERROR_NOT_ALL_ASSIGNED {
        debug!("{privilege_name} is not held by this token");
        return Err(RemodError::Privilege(privilege_name.to_string(), code));
    }

    info!("enabled privilege {privilege_name}");
    Ok(())
}
