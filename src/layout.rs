//! Offset tables for the remote structures the walker reads.
//!
//! The process control block (`PEB`) and its parameters block
//! (`RTL_USER_PROCESS_PARAMETERS`) are undocumented and exist in a
//! 32-bit and a 64-bit shape. Rather than punning `#[repr(C)]` structs
//! over remote bytes, each shape is described by a table of byte
//! offsets and every field is pulled out of the raw buffer explicitly.
//! A reader must pair a buffer with the table it was read under; the
//! tables mean nothing for bytes read under the other shape.

pub struct ParamsLayout {
    /// Remote pointer width in bytes.
    pub ptr_size: usize,
    /// Bytes of the PEB prefix to fetch.
    pub peb_read_len: usize,
    /// Offset of `ProcessParameters` inside the PEB.
    pub peb_params: usize,
    /// Bytes of the parameters-block prefix to fetch.
    pub params_read_len: usize,
    /// Offset of the `CurrentDirectoryPath` UNICODE_STRING.
    pub current_directory: usize,
    /// Offset of the `CommandLine` UNICODE_STRING.
    pub command_line: usize,
    /// Offset of the environment-block pointer. Address only; the
    /// block's extent is unknown until the owning region is probed.
    pub environment: usize,
    /// Offset of `Buffer` inside a UNICODE_STRING of this shape.
    pub ustr_buffer: usize,
}

pub const PARAMS32: ParamsLayout = ParamsLayout {
    ptr_size: 4,
    peb_read_len: 20,
    peb_params: 16,
    params_read_len: 76,
    current_directory: 36,
    command_line: 64,
    environment: 72,
    ustr_buffer: 4,
};

pub const PARAMS64: ParamsLayout = ParamsLayout {
    ptr_size: 8,
    peb_read_len: 40,
    peb_params: 32,
    params_read_len: 136,
    current_directory: 56,
    command_line: 112,
    environment: 128,
    ustr_buffer: 8,
};

/// PROCESS_BASIC_INFORMATION: `PebBaseAddress` sits one pointer in,
/// and the struct is six pointers long.
pub const PBI_PEB_FIELD: usize = 1;
pub const PBI_FIELDS: usize = 6;

impl ParamsLayout {
    pub fn native() -> &'static ParamsLayout {
        match core::mem::size_of::<usize>() {
            8 => &PARAMS64,
            _ => &PARAMS32,
        }
    }

    /// Remote pointer at `off`, widened to u64.
    pub fn ptr_at(&self, buf: &[u8], off: usize) -> u64 {
        match self.ptr_size {
            8 => u64_at(buf, off),
            _ => u32_at(buf, off) as u64,
        }
    }

    /// UNICODE_STRING at `off`: `(Buffer, Length)` with the length in
    /// bytes, exactly as the target stores it.
    pub fn ustr_at(&self, buf: &[u8], off: usize) -> (u64, u16) {
        (self.ptr_at(buf, off + self.ustr_buffer), u16_at(buf, off))
    }
}

pub fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub fn u32_at(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

pub fn u64_at(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}

#[test]
fn tables_match_the_documented_shapes() {
    // UNICODE_STRING32 is {u16, u16, u32}; UNICODE_STRING64 pads the
    // buffer pointer to an 8-byte boundary.
    assert_eq!(PARAMS32.ustr_buffer, 4);
    assert_eq!(PARAMS64.ustr_buffer, 8);

    // CurrentDirectoryPath, DllPath, ImagePathName, CommandLine are
    // consecutive UNICODE_STRINGs separated by the directory handle;
    // the environment pointer follows CommandLine directly.
    assert_eq!(PARAMS32.command_line, PARAMS32.current_directory + 8 + 4 + 2 * 8);
    assert_eq!(PARAMS32.environment, PARAMS32.command_line + 8);
    assert_eq!(PARAMS32.params_read_len, PARAMS32.environment + 4);
    assert_eq!(PARAMS64.command_line, PARAMS64.current_directory + 16 + 8 + 2 * 16);
    assert_eq!(PARAMS64.environment, PARAMS64.command_line + 16);
    assert_eq!(PARAMS64.params_read_len, PARAMS64.environment + 8);

    // The fetched PEB prefix covers the ProcessParameters pointer.
    assert_eq!(PARAMS32.peb_read_len, PARAMS32.peb_params + 4);
    assert_eq!(PARAMS64.peb_read_len, PARAMS64.peb_params + 8);
}

#[test]
fn field_readers_are_little_endian() {
    let buf = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa];
    assert_eq!(u16_at(&buf, 1), 0x3322);
    assert_eq!(u32_at(&buf, 2), 0x66554433);
    assert_eq!(u64_at(&buf, 1), 0x9988776655443322);
}

#[test]
fn pointer_reads_follow_the_table_width() {
    let mut buf = vec![0u8; 16];
    buf[..8].copy_from_slice(&0x1122334455667788_u64.to_le_bytes());
    assert_eq!(PARAMS32.ptr_at(&buf, 0), 0x55667788);
    assert_eq!(PARAMS64.ptr_at(&buf, 0), 0x1122334455667788);
}

#[test]
fn unicode_string_reads_split_length_and_buffer() {
    let mut buf = vec![0u8; 16];
    buf[..2].copy_from_slice(&0x001c_u16.to_le_bytes()); // Length
    buf[2..4].copy_from_slice(&0x0020_u16.to_le_bytes()); // MaximumLength
    buf[4..8].copy_from_slice(&0xdeadbeef_u32.to_le_bytes());
    assert_eq!(PARAMS32.ustr_at(&buf, 0), (0xdeadbeef, 0x1c));

    buf[8..16].copy_from_slice(&0xcafe0000cafe_u64.to_le_bytes());
    assert_eq!(PARAMS64.ustr_at(&buf, 0), (0xcafe0000cafe, 0x1c));
}
