use core::{mem, ptr};

use windows_sys::Win32::{
    Foundation::{GetLastError, FALSE},
    System::{
        Diagnostics::Debug::ReadProcessMemory,
        Memory::{VirtualQueryEx, MEMORY_BASIC_INFORMATION},
    },
};

use super::ntdll::{self, nt_success, MEMORY_BASIC_INFORMATION_CLASS};
use super::{Bitness, ProcessHandle};
use crate::error::{Error, Result};

/// MEMORY_BASIC_INFORMATION64, needed when querying a 64-bit target
/// from a 32-bit caller. The thunked entry point is loaded by name, so
/// the struct is spelled out here rather than bound from the SDK.
#[repr(C)]
struct MemoryBasicInformation64 {
    base_address: u64,
    allocation_base: u64,
    allocation_protect: u32,
    _alignment1: u32,
    region_size: u64,
    state: u32,
    protect: u32,
    kind: u32,
    _alignment2: u32,
}

/// Bytes left in the region owning `addr`, counted from `addr` to the
/// region end. An upper bound on readable data, not a logical length.
pub fn region_size(handle: &ProcessHandle, addr: u64, bitness: Bitness) -> Result<u64> {
    match bitness {
        Bitness::TargetWider => {
            let query = ntdll::exports()
                .wow64_query_virtual_memory64
                .ok_or_else(|| ntdll::missing("NtWow64QueryVirtualMemory64"))?;

            let mut info: MemoryBasicInformation64 = unsafe { mem::zeroed() };
            let status = unsafe {
                query(
                    handle.raw(),
                    addr,
                    MEMORY_BASIC_INFORMATION_CLASS,
                    &mut info as *mut MemoryBasicInformation64 as _,
                    mem::size_of::<MemoryBasicInformation64>() as u64,
                    ptr::null_mut(),
                )
            };
            if !nt_success(status) {
                return Err(Error::Platform { call: "NtWow64QueryVirtualMemory64", code: status as u32 });
            }
            Ok(info.region_size - (addr - info.base_address))
        }
        _ => {
            let mut info: MEMORY_BASIC_INFORMATION = unsafe { mem::zeroed() };
            let ret = unsafe {
                VirtualQueryEx(handle.raw(), addr as usize as _, &mut info, mem::size_of::<MEMORY_BASIC_INFORMATION>())
            };
            if ret == 0 {
                let code = unsafe { GetLastError() };
                return Err(Error::Platform { call: "VirtualQueryEx", code });
            }
            Ok(info.RegionSize as u64 - (addr - info.BaseAddress as u64))
        }
    }
}

/// Fill `buf` from the target, all or nothing. `what` names the read
/// for diagnostics; partial transfers are failures.
pub fn read_exact(
    handle: &ProcessHandle,
    addr: u64,
    buf: &mut [u8],
    bitness: Bitness,
    what: &'static str,
) -> Result<()> {
    match bitness {
        Bitness::TargetWider => {
            let read = ntdll::exports()
                .wow64_read_virtual_memory64
                .ok_or_else(|| ntdll::missing("NtWow64ReadVirtualMemory64"))?;

            let status =
                unsafe { read(handle.raw(), addr, buf.as_mut_ptr() as _, buf.len() as u64, ptr::null_mut()) };
            if !nt_success(status) {
                return Err(Error::Platform { call: what, code: status as u32 });
            }
            Ok(())
        }
        _ => {
            let ret = unsafe {
                ReadProcessMemory(handle.raw(), addr as usize as _, buf.as_mut_ptr() as _, buf.len(), ptr::null_mut())
            };
            if ret == FALSE {
                let code = unsafe { GetLastError() };
                return Err(Error::Platform { call: what, code });
            }
            Ok(())
        }
    }
}

/// Copy `len` remote bytes into a fresh buffer of `len + 2` zeroed
/// bytes; the two spare bytes hold the wide NUL the decoders expect.
/// The caller keeps ownership of the handle.
pub fn copy_remote(
    handle: &ProcessHandle,
    addr: u64,
    len: usize,
    bitness: Bitness,
    what: &'static str,
) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(len + 2)?;
    buf.resize(len + 2, 0);
    read_exact(handle, addr, &mut buf[..len], bitness, what)?;
    Ok(buf)
}
