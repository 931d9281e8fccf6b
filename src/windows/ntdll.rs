//! ntdll entry points that have no import-library binding.
//!
//! Resolved once per process and cached; the cache is immutable after
//! initialization. `OnceLock` makes the initialization idempotent, so
//! concurrent first callers are harmless.

use core::{ffi::c_void, mem};
use std::sync::OnceLock;

use windows_sys::Win32::{
    Foundation::{ERROR_PROC_NOT_FOUND, HANDLE, NTSTATUS},
    System::LibraryLoader::{GetModuleHandleA, GetProcAddress},
};

use crate::error::Error;

// NtQueryInformationProcess / NtWow64QueryInformationProcess64
pub type QueryInformationProcess =
    unsafe extern "system" fn(HANDLE, u32, *mut c_void, u32, *mut u32) -> NTSTATUS;
// NtWow64ReadVirtualMemory64
pub type ReadVirtualMemory64 =
    unsafe extern "system" fn(HANDLE, u64, *mut c_void, u64, *mut u64) -> NTSTATUS;
// NtWow64QueryVirtualMemory64
pub type QueryVirtualMemory64 =
    unsafe extern "system" fn(HANDLE, u64, u32, *mut c_void, u64, *mut u64) -> NTSTATUS;
// NtQuerySystemInformation
pub type QuerySystemInformation = unsafe extern "system" fn(u32, *mut c_void, u32, *mut u32) -> NTSTATUS;

/// PROCESSINFOCLASS values.
pub const PROCESS_BASIC_INFORMATION: u32 = 0;
pub const PROCESS_WOW64_INFORMATION: u32 = 26;

/// SYSTEM_INFORMATION_CLASS value for the whole-system process list.
pub const SYSTEM_PROCESS_INFORMATION: u32 = 5;

/// MEMORY_INFORMATION_CLASS value for NtWow64QueryVirtualMemory64.
pub const MEMORY_BASIC_INFORMATION_CLASS: u32 = 0;

pub const STATUS_INFO_LENGTH_MISMATCH: NTSTATUS = 0xC0000004_u32 as NTSTATUS;
pub const STATUS_BUFFER_TOO_SMALL: NTSTATUS = 0xC0000023_u32 as NTSTATUS;

pub fn nt_success(status: NTSTATUS) -> bool {
    status >= 0
}

pub fn missing(call: &'static str) -> Error {
    Error::Platform { call, code: ERROR_PROC_NOT_FOUND }
}

pub struct Exports {
    pub query_information_process: Option<QueryInformationProcess>,
    pub wow64_query_information_process64: Option<QueryInformationProcess>,
    pub wow64_read_virtual_memory64: Option<ReadVirtualMemory64>,
    pub wow64_query_virtual_memory64: Option<QueryVirtualMemory64>,
    pub query_system_information: Option<QuerySystemInformation>,
}

pub fn exports() -> &'static Exports {
    static EXPORTS: OnceLock<Exports> = OnceLock::new();
    EXPORTS.get_or_init(|| unsafe { load() })
}

unsafe fn load() -> Exports {
    let ntdll = GetModuleHandleA(b"ntdll.dll\0".as_ptr());
    if ntdll == 0 {
        return Exports {
            query_information_process: None,
            wow64_query_information_process64: None,
            wow64_read_virtual_memory64: None,
            wow64_query_virtual_memory64: None,
            query_system_information: None,
        };
    }
    Exports {
        query_information_process: mem::transmute(GetProcAddress(
            ntdll,
            b"NtQueryInformationProcess\0".as_ptr(),
        )),
        wow64_query_information_process64: mem::transmute(GetProcAddress(
            ntdll,
            b"NtWow64QueryInformationProcess64\0".as_ptr(),
        )),
        wow64_read_virtual_memory64: mem::transmute(GetProcAddress(
            ntdll,
            b"NtWow64ReadVirtualMemory64\0".as_ptr(),
        )),
        wow64_query_virtual_memory64: mem::transmute(GetProcAddress(
            ntdll,
            b"NtWow64QueryVirtualMemory64\0".as_ptr(),
        )),
        query_system_information: mem::transmute(GetProcAddress(
            ntdll,
            b"NtQuerySystemInformation\0".as_ptr(),
        )),
    }
}
