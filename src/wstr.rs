//! UTF-16 decoding for buffers copied out of a target process.

use std::collections::HashMap;

/// Reassemble little-endian wide units from a raw byte copy.
pub fn units(buf: &[u8]) -> Vec<u16> {
    buf.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect()
}

pub fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

pub fn decode_until_nul(units: &[u16]) -> String {
    let len = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    decode(&units[..len])
}

/// Path decode: the stored current directory usually keeps a trailing
/// separator; drop one.
pub fn decode_path(units: &[u16]) -> String {
    let mut path = decode_until_nul(units);
    if path.ends_with('\\') || path.ends_with('/') {
        path.pop();
    }
    path
}

/// Parse a `name=value\0name=value\0\0` environment block.
///
/// Content past the first double-NUL is garbage and ignored; a block
/// that never double-terminates is consumed to its end, which the
/// region probe already bounds. Entries with no `=` past the first
/// unit carry no name and are skipped.
pub fn environ_map(units: &[u16]) -> HashMap<String, String> {
    let mut end = units.len();
    let mut nuls = 0;
    for (i, &u) in units.iter().enumerate() {
        match u {
            0 => {
                nuls += 1;
                if nuls == 2 {
                    end = i - 1;
                    break;
                }
            }
            _ => nuls = 0,
        }
    }

    let mut map = HashMap::new();
    for entry in units[..end].split(|&u| u == 0) {
        if entry.is_empty() {
            continue;
        }
        let entry = decode(entry);
        if let Some((i, _)) = entry.char_indices().find(|&(i, c)| c == '=' && i > 0) {
            map.insert(entry[..i].to_string(), entry[i + 1..].to_string());
        }
    }
    map
}

#[cfg(test)]
fn w(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

#[test]
fn environ_stops_at_the_double_nul() {
    let block = w("A=1\0B=2\0\0garbage=3\0\0");
    let map = environ_map(&block);
    assert_eq!(map.len(), 2);
    assert_eq!(map["A"], "1");
    assert_eq!(map["B"], "2");
}

#[test]
fn environ_empty_block_yields_nothing() {
    assert!(environ_map(&w("\0\0")).is_empty());
    assert!(environ_map(&[]).is_empty());
}

#[test]
fn environ_without_terminator_is_consumed_whole() {
    let map = environ_map(&w("A=1\0B=2"));
    assert_eq!(map.len(), 2);
    assert_eq!(map["B"], "2");
}

#[test]
fn environ_splits_on_the_first_assignment_only() {
    let map = environ_map(&w("PATHEXT=.COM;.EXE\0X=a=b\0\0"));
    assert_eq!(map["PATHEXT"], ".COM;.EXE");
    assert_eq!(map["X"], "a=b");
}

#[test]
fn environ_keeps_drive_entries_with_leading_assignment() {
    // cmd.exe seeds hidden entries shaped "=C:=C:\dir"; the name is
    // "=C:" because the split must land past the first unit.
    let map = environ_map(&w("=C:=C:\\tmp\0A=1\0\0"));
    assert_eq!(map["=C:"], "C:\\tmp");
    assert_eq!(map["A"], "1");
}

#[test]
fn path_decode_strips_one_trailing_separator() {
    assert_eq!(decode_path(&w("C:\\Users\\test\\")), "C:\\Users\\test");
    assert_eq!(decode_path(&w("C:\\Users\\test")), "C:\\Users\\test");
    assert_eq!(decode_path(&w("C:\\x\0junk")), "C:\\x");
}

#[test]
fn unit_reassembly_is_little_endian() {
    assert_eq!(units(&[0x41, 0x00, 0x42, 0x00]), [0x41, 0x42]);
    assert_eq!(units(&[0x00, 0xd8]), [0xd800]);
}
