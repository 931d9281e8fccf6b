use core::{mem, ptr};

use super::ntdll::{self, nt_success, PROCESS_WOW64_INFORMATION};
use super::ProcessHandle;
use crate::error::{Error, Result};

/// Bitness relation between the caller and the target. Picked fresh
/// for every extraction; selects both the struct layout and the
/// remote-access primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bitness {
    /// Caller and target share a pointer width; native layout, native
    /// remote reads.
    Same,
    /// 64-bit caller, 32-bit target under the compatibility subsystem;
    /// 32-bit layout, native remote reads.
    TargetNarrower,
    /// 32-bit caller under the compatibility subsystem, 64-bit target;
    /// 64-bit layout and the thunked read/query entry points, because
    /// the native ones truncate wide addresses.
    TargetWider,
}

#[cfg(target_pointer_width = "64")]
pub fn resolve(handle: &ProcessHandle) -> Result<Bitness> {
    Ok(match wow64_peb(handle)? {
        0 => Bitness::Same,
        _ => Bitness::TargetNarrower,
    })
}

#[cfg(target_pointer_width = "32")]
pub fn resolve(handle: &ProcessHandle) -> Result<Bitness> {
    use windows_sys::Win32::{
        Foundation::{GetLastError, FALSE},
        System::Threading::{GetCurrentProcess, IsWow64Process},
    };

    let mut caller_narrowed = 0;
    let mut target_narrowed = 0;
    unsafe {
        if IsWow64Process(GetCurrentProcess(), &mut caller_narrowed) == FALSE
            || IsWow64Process(handle.raw(), &mut target_narrowed) == FALSE
        {
            let code = GetLastError();
            return Err(Error::Platform { call: "IsWow64Process", code });
        }
    }
    Ok(match (caller_narrowed, target_narrowed) {
        (c, 0) if c != 0 => Bitness::TargetWider,
        _ => Bitness::Same,
    })
}

/// Base of the target's 32-bit control block, or 0 when the target is
/// not running under the compatibility subsystem.
pub(crate) fn wow64_peb(handle: &ProcessHandle) -> Result<u64> {
    let query = ntdll::exports()
        .query_information_process
        .ok_or_else(|| ntdll::missing("NtQueryInformationProcess"))?;

    let mut peb32: usize = 0;
    let status = unsafe {
        query(
            handle.raw(),
            PROCESS_WOW64_INFORMATION,
            &mut peb32 as *mut usize as _,
            mem::size_of::<usize>() as u32,
            ptr::null_mut(),
        )
    };
    if !nt_success(status) {
        return Err(Error::Platform { call: "NtQueryInformationProcess", code: status as u32 });
    }
    Ok(peb32 as u64)
}
