//! The Windows extraction engine: open and validate a handle, resolve
//! the bitness relation, walk the control block, copy the field out,
//! decode locally. Handles and buffers never outlive one call.

mod arch;
mod handle;
mod ntdll;
mod pids;
mod read;
mod snapshot;
mod walker;

use core::slice;
use std::collections::HashMap;

use windows_sys::Win32::{
    Foundation::{GetLastError, LocalFree},
    UI::Shell::CommandLineToArgvW,
};

pub use self::arch::Bitness;
pub use self::handle::ProcessHandle;
pub use self::snapshot::ProcessEntry;
pub use self::walker::{Field, RemoteSpan};

use crate::error::{self, Error, Result};
use crate::{wstr, Pid};

/// Ordered argument list of the target, tokenized with the host
/// convention.
pub fn cmdline(pid: Pid) -> Result<Vec<String>> {
    reported(pid, field_units(pid, Field::CommandLine).and_then(|units| split_args(&units)))
}

/// Working directory of the target, trailing separator stripped.
pub fn cwd(pid: Pid) -> Result<String> {
    reported(pid, field_units(pid, Field::WorkingDirectory).map(|units| wstr::decode_path(&units)))
}

/// Environment of the target, parsed from its double-NUL-terminated
/// `name=value` block.
pub fn environ(pid: Pid) -> Result<HashMap<String, String>> {
    reported(pid, field_units(pid, Field::Environment).map(|units| wstr::environ_map(&units)))
}

/// Live process identifiers, point in time.
pub fn pids() -> Result<Vec<Pid>> {
    reported(0, pids::pids())
}

/// Snapshot-scan fallback: the coarse per-process record for targets
/// that deny a direct open.
pub fn process_entry(pid: Pid) -> Result<ProcessEntry> {
    reported(pid, snapshot::scan_for_pid(pid))
}

/// One full extraction: handle, bitness, descriptor, bounds, copy.
/// The handle drops on every path out of here.
fn field_units(pid: Pid, field: Field) -> Result<Vec<u16>> {
    let handle = ProcessHandle::open_for_query(pid)?;
    let bitness = arch::resolve(&handle)?;
    let span = walker::locate(&handle, bitness, field)?;
    let len = match span.len {
        Some(len) => len,
        // Only the environment arrives without a recorded length; its
        // region extent is the copy bound, the double NUL the logical
        // end.
        None => read::region_size(&handle, span.addr, bitness)?,
    };
    let len = usize::try_from(len).map_err(|_| Error::OutOfMemory)?;
    let buf = read::copy_remote(&handle, span.addr, len, bitness, field.read_tag())?;
    Ok(wstr::units(&buf))
}

/// Tokenize with CommandLineToArgvW, the convention every Windows
/// program is parsed under. `units` must be NUL-terminated, which the
/// copier's zeroed tail guarantees.
fn split_args(units: &[u16]) -> Result<Vec<String>> {
    let mut argc = 0i32;
    let argv = unsafe { CommandLineToArgvW(units.as_ptr(), &mut argc) };
    if argv.is_null() {
        let code = unsafe { GetLastError() };
        return Err(Error::Platform { call: "CommandLineToArgvW", code });
    }

    let mut args = Vec::with_capacity(argc as usize);
    for i in 0..argc as usize {
        unsafe {
            let arg = *argv.add(i);
            let mut len = 0;
            while *arg.add(len) != 0 {
                len += 1;
            }
            args.push(wstr::decode(slice::from_raw_parts(arg, len)));
        }
    }
    unsafe { LocalFree(argv as _) };
    Ok(args)
}

/// Mirror every failure to the installed sink before propagating.
fn reported<T>(pid: Pid, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error::report(pid, err);
    }
    result
}
