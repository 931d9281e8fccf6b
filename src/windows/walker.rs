use core::{mem, ptr};

use super::ntdll::{self, nt_success, PROCESS_BASIC_INFORMATION};
use super::{arch, read, Bitness, ProcessHandle};
use crate::error::{Error, Result};
use crate::layout::{self, ParamsLayout, PARAMS32, PARAMS64, PBI_FIELDS, PBI_PEB_FIELD};

/// The three fields the engine knows how to extract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    CommandLine,
    WorkingDirectory,
    Environment,
}

impl Field {
    pub(crate) fn read_tag(self) -> &'static str {
        match self {
            Field::CommandLine => "read command line",
            Field::WorkingDirectory => "read current directory",
            Field::Environment => "read environment block",
        }
    }
}

/// A located field: a remote address, plus the byte length when the
/// parameters block records one. Valid only while the handle that
/// produced it is open, and only under the bitness it was read with.
#[derive(Clone, Copy, Debug)]
pub struct RemoteSpan {
    pub addr: u64,
    pub len: Option<u64>,
}

/// Walk control block -> parameters block -> field descriptor.
pub fn locate(handle: &ProcessHandle, bitness: Bitness, field: Field) -> Result<RemoteSpan> {
    let layout: &ParamsLayout = match bitness {
        Bitness::Same => ParamsLayout::native(),
        Bitness::TargetNarrower => &PARAMS32,
        Bitness::TargetWider => &PARAMS64,
    };

    let peb = peb_base(handle, bitness)?;

    let mut peb_buf = vec![0u8; layout.peb_read_len];
    read::read_exact(handle, peb, &mut peb_buf, bitness, "read process control block")?;
    let params = layout.ptr_at(&peb_buf, layout.peb_params);

    let mut params_buf = vec![0u8; layout.params_read_len];
    read::read_exact(handle, params, &mut params_buf, bitness, "read process parameters")?;

    Ok(match field {
        Field::CommandLine => {
            let (addr, len) = layout.ustr_at(&params_buf, layout.command_line);
            RemoteSpan { addr, len: Some(len as u64) }
        }
        Field::WorkingDirectory => {
            let (addr, len) = layout.ustr_at(&params_buf, layout.current_directory);
            RemoteSpan { addr, len: Some(len as u64) }
        }
        Field::Environment => RemoteSpan { addr: layout.ptr_at(&params_buf, layout.environment), len: None },
    })
}

fn peb_base(handle: &ProcessHandle, bitness: Bitness) -> Result<u64> {
    match bitness {
        Bitness::Same => {
            let query = ntdll::exports()
                .query_information_process
                .ok_or_else(|| ntdll::missing("NtQueryInformationProcess"))?;

            let mut pbi = [0u8; PBI_FIELDS * mem::size_of::<usize>()];
            let status = unsafe {
                query(handle.raw(), PROCESS_BASIC_INFORMATION, pbi.as_mut_ptr() as _, pbi.len() as u32, ptr::null_mut())
            };
            if !nt_success(status) {
                return Err(Error::Platform { call: "NtQueryInformationProcess", code: status as u32 });
            }
            Ok(ParamsLayout::native().ptr_at(&pbi, PBI_PEB_FIELD * mem::size_of::<usize>()))
        }
        Bitness::TargetNarrower => arch::wow64_peb(handle),
        Bitness::TargetWider => {
            let query = ntdll::exports()
                .wow64_query_information_process64
                .ok_or_else(|| ntdll::missing("NtWow64QueryInformationProcess64"))?;

            let mut pbi = [0u8; PBI_FIELDS * 8];
            let status = unsafe {
                query(handle.raw(), PROCESS_BASIC_INFORMATION, pbi.as_mut_ptr() as _, pbi.len() as u32, ptr::null_mut())
            };
            if !nt_success(status) {
                return Err(Error::Platform { call: "NtWow64QueryInformationProcess64", code: status as u32 });
            }
            Ok(layout::u64_at(&pbi, PBI_PEB_FIELD * 8))
        }
    }
}
