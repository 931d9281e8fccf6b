use core::mem;

use windows_sys::Win32::{
    Foundation::{GetLastError, FALSE},
    System::ProcessStatus::EnumProcesses,
};

use crate::error::{Error, Result};
use crate::Pid;

const GROW_SLOTS: usize = 1024;

/// All currently live process identifiers.
///
/// EnumProcesses has no "buffer too small" signal; the only hint is a
/// returned byte count that exactly fills the buffer. Grow by a fixed
/// increment and retry until the fill is strictly smaller.
pub fn pids() -> Result<Vec<Pid>> {
    let mut slots = GROW_SLOTS;
    loop {
        let mut buf: Vec<Pid> = Vec::new();
        buf.try_reserve_exact(slots)?;
        buf.resize(slots, 0);

        let bytes = (slots * mem::size_of::<Pid>()) as u32;
        let mut filled = 0u32;
        let ret = unsafe { EnumProcesses(buf.as_mut_ptr(), bytes, &mut filled) };
        if ret == FALSE {
            let code = unsafe { GetLastError() };
            return Err(Error::Platform { call: "EnumProcesses", code });
        }
        if filled == bytes {
            slots += GROW_SLOTS;
            continue;
        }
        buf.truncate(filled as usize / mem::size_of::<Pid>());
        return Ok(buf);
    }
}

/// Membership probe backing the liveness cross-checks.
pub fn pid_present(pid: Pid) -> Result<bool> {
    Ok(pids()?.contains(&pid))
}
