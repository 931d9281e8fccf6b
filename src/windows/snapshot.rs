//! Whole-system snapshot walk, the privilege-independent fallback for
//! targets that refuse a direct open.

use core::{mem, ptr, slice};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::ntdll::{
    self, nt_success, STATUS_BUFFER_TOO_SMALL, STATUS_INFO_LENGTH_MISMATCH, SYSTEM_PROCESS_INFORMATION,
};
use crate::error::{Error, Result};
use crate::{wstr, Pid};

/// One decoded record from the system process list. Coarser than the
/// control-block walk, but it needs no per-process read rights.
#[derive(Clone, Debug)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub parent: Pid,
    pub name: String,
    pub threads: u32,
    pub handles: u32,
    pub session_id: u32,
}

/// Prefix of SYSTEM_PROCESS_INFORMATION, native bitness. The snapshot
/// is produced for our own address space, so struct punning is exact
/// here; records are only ever read through `read_unaligned`.
#[repr(C)]
struct SystemProcessRecord {
    next_entry_offset: u32,
    number_of_threads: u32,
    working_set_private_size: i64,
    hard_fault_count: u32,
    number_of_threads_high_watermark: u32,
    cycle_time: u64,
    create_time: i64,
    user_time: i64,
    kernel_time: i64,
    image_name_length: u16,
    image_name_maximum_length: u16,
    image_name_buffer: usize,
    base_priority: i32,
    unique_process_id: usize,
    inherited_from_unique_process_id: usize,
    handle_count: u32,
    session_id: u32,
}

const INITIAL_SNAPSHOT_LEN: usize = 0x4000;
const SNAPSHOT_HINT_CEILING: usize = 0x20000;

// Remembered across calls to skip the resize round trip next time.
// Two threads may race the store; both values are fresh reports, so
// whichever lands is fine.
static SNAPSHOT_HINT: AtomicUsize = AtomicUsize::new(INITIAL_SNAPSHOT_LEN);

pub fn scan_for_pid(pid: Pid) -> Result<ProcessEntry> {
    let snap = snapshot()?;
    find_record(snap.bytes(), pid).ok_or(Error::NoSuchProcess(pid))
}

/// Word-aligned owned buffer; record and string fields inside the
/// snapshot assume more than byte alignment.
struct Snapshot {
    words: Vec<u64>,
    len: usize,
}

impl Snapshot {
    fn bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast(), self.len) }
    }
}

fn snapshot() -> Result<Snapshot> {
    let query = ntdll::exports()
        .query_system_information
        .ok_or_else(|| ntdll::missing("NtQuerySystemInformation"))?;

    let mut size = SNAPSHOT_HINT.load(Ordering::Relaxed);
    loop {
        let mut words: Vec<u64> = Vec::new();
        words.try_reserve_exact(size.div_ceil(8))?;
        words.resize(size.div_ceil(8), 0);

        let mut needed = 0u32;
        let status =
            unsafe { query(SYSTEM_PROCESS_INFORMATION, words.as_mut_ptr() as _, size as u32, &mut needed) };
        match status {
            STATUS_INFO_LENGTH_MISMATCH | STATUS_BUFFER_TOO_SMALL => {
                // This primitive reports the size it wants. The report
                // can go stale while processes spawn, so never shrink.
                size = match needed as usize {
                    n if n > size => n,
                    _ => size * 2,
                };
            }
            s if !nt_success(s) => {
                return Err(Error::Platform { call: "NtQuerySystemInformation", code: s as u32 })
            }
            _ => {
                let len = match needed as usize {
                    0 => size,
                    n => n.min(size),
                };
                if len <= SNAPSHOT_HINT_CEILING {
                    SNAPSHOT_HINT.store(len, Ordering::Relaxed);
                }
                return Ok(Snapshot { words, len });
            }
        }
    }
}

/// Chase the record chain: each record stores a byte offset to the
/// next, zero meaning last.
fn find_record(buf: &[u8], pid: Pid) -> Option<ProcessEntry> {
    let mut off = 0usize;
    loop {
        if off + mem::size_of::<SystemProcessRecord>() > buf.len() {
            return None;
        }
        let rec: SystemProcessRecord = unsafe { ptr::read_unaligned(buf.as_ptr().add(off) as *const _) };
        if rec.unique_process_id == pid as usize {
            return Some(ProcessEntry {
                pid,
                parent: rec.inherited_from_unique_process_id as Pid,
                name: record_name(buf, &rec),
                threads: rec.number_of_threads,
                handles: rec.handle_count,
                session_id: rec.session_id,
            });
        }
        match rec.next_entry_offset {
            0 => return None,
            n => off += n as usize,
        }
    }
}

/// The image-name string lives inside the snapshot itself; anything
/// pointing elsewhere is treated as nameless.
fn record_name(buf: &[u8], rec: &SystemProcessRecord) -> String {
    let len = rec.image_name_length as usize;
    let Some(rel) = rec.image_name_buffer.checked_sub(buf.as_ptr() as usize) else {
        return String::new();
    };
    match buf.get(rel..).and_then(|tail| tail.get(..len)) {
        Some(raw) => wstr::decode(&wstr::units(raw)),
        None => String::new(),
    }
}

#[cfg(test)]
fn push_record(buf: &mut Vec<u8>, pid: usize, threads: u32, next: u32) {
    let rec = SystemProcessRecord {
        next_entry_offset: next,
        number_of_threads: threads,
        working_set_private_size: 0,
        hard_fault_count: 0,
        number_of_threads_high_watermark: 0,
        cycle_time: 0,
        create_time: 0,
        user_time: 0,
        kernel_time: 0,
        image_name_length: 0,
        image_name_maximum_length: 0,
        image_name_buffer: 0,
        base_priority: 8,
        unique_process_id: pid,
        inherited_from_unique_process_id: 4,
        handle_count: 7,
        session_id: 1,
    };
    let start = buf.len();
    buf.resize(start + mem::size_of::<SystemProcessRecord>(), 0);
    unsafe { ptr::write_unaligned(buf.as_mut_ptr().add(start) as *mut SystemProcessRecord, rec) };
    if next as usize > mem::size_of::<SystemProcessRecord>() {
        // pad out to the claimed record stride
        buf.resize(start + next as usize, 0);
    }
}

#[test]
fn record_walk_follows_the_offset_chain() {
    let mut buf = Vec::new();
    push_record(&mut buf, 4, 9, 0x200);
    push_record(&mut buf, 1234, 3, 0x180);
    push_record(&mut buf, 5678, 1, 0);

    let entry = find_record(&buf, 1234).unwrap();
    assert_eq!(entry.threads, 3);
    assert_eq!(entry.parent, 4);
    assert_eq!(entry.session_id, 1);
    assert!(entry.name.is_empty());

    assert_eq!(find_record(&buf, 5678).unwrap().threads, 1);
    assert!(find_record(&buf, 999).is_none());
}

#[test]
fn record_walk_stops_at_a_truncated_tail() {
    let mut buf = Vec::new();
    push_record(&mut buf, 4, 9, 0x200);
    buf.resize(0x200 + 8, 0); // next record cut off mid-struct
    assert!(find_record(&buf, 1234).is_none());
}

#[test]
fn record_names_outside_the_snapshot_are_dropped() {
    let mut buf = Vec::new();
    push_record(&mut buf, 4, 9, 0);
    let mut rec: SystemProcessRecord = unsafe { ptr::read_unaligned(buf.as_ptr() as *const _) };
    rec.image_name_length = 8;
    rec.image_name_buffer = usize::MAX - 64;
    unsafe { ptr::write_unaligned(buf.as_mut_ptr() as *mut _, rec) };
    assert_eq!(find_record(&buf, 4).unwrap().name, "");
}
