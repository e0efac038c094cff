//! Walks a target process's loader records to locate a named module.
//!
//! The loader keeps every loaded module on circular doubly linked lists
//! anchored in the process environment block. The walk here follows the
//! in-memory-order list: read the list head out of the loader data, then
//! chase forward links, copying each record out of the target and comparing
//! its short name until the target module turns up or the chain returns to
//! the head.
//!
//! The target may load or unload a module while the list is being walked;
//! the loader's own lock cannot be taken from outside the process. A torn
//! read therefore surfaces as a remote-read error for the whole operation
//! and the caller reruns the tool. The walk is never retried internally.

use log::{debug, trace};

use crate::memory::{ByteView, ProcessMemory, ProcessMemoryExt};
use crate::pattern;
use crate::{error::RemodError, Result};

// x86_64 layouts. Targets with a different pointer width are unsupported.
const PEB_READ_LEN: usize = 0x20;
const PEB_LDR: usize = 0x18;

const LDR_READ_LEN: usize = 0x30;
const LDR_IN_MEMORY_ORDER_LIST: usize = 0x20;

const ENTRY_IN_MEMORY_ORDER_LINKS: usize = 0x10;
const ENTRY_DLL_BASE: usize = 0x30;
const ENTRY_ENTRY_POINT: usize = 0x38;
const ENTRY_SIZE_OF_IMAGE: usize = 0x40;
const ENTRY_FULL_DLL_NAME: usize = 0x48;
const ENTRY_BASE_DLL_NAME: usize = 0x58;
const ENTRY_READ_LEN: usize = 0x68;

/// Longest module name buffer the walk will copy, in bytes (MAX_PATH
/// UTF-16 units).
const NAME_BUF_LEN: usize = 260 * 2;

/// A length-prefixed string descriptor pointing into the target's memory.
///
/// Only meaningful as a point-in-time copy; the buffer address must not be
/// dereferenced without a fresh remote read.
#[derive(Debug, Clone, Copy)]
pub struct RemoteString {
    pub length: u16,
    pub maximum_length: u16,
    pub buffer: u64,
}

impl RemoteString {
    fn parse(view: &ByteView<'_>, offset: usize) -> Result<Self> {
        Ok(Self {
            length: view.u16_at(offset)?,
            maximum_length: view.u16_at(offset + 2)?,
            buffer: view.u64_at(offset + 8)?,
        })
    }
}

/// A copy of one loaded-module record from the target's loader list.
///
/// Every field is a snapshot taken during a single walk. The list links
/// and string buffers point into the target's address space and may be
/// stale by the time the copy is inspected, so nothing here is followed
/// without a fresh read.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Image base address; doubles as the module's handle.
    pub base: u64,
    pub entry_point: u64,
    pub image_size: u32,
    /// Short name, copied out of the target and stripped of any path.
    pub base_name: String,
    /// Full image path, copied out of the target.
    pub full_path: String,
    /// Descriptors for the two name strings inside the remote record.
    pub base_name_desc: RemoteString,
    pub full_name_desc: RemoteString,
    /// Forward and backward links of the in-memory-order list entry.
    pub flink: u64,
    pub blink: u64,
}

/// Reads a remote UNICODE_STRING buffer into UTF-16 units, bounded to
/// `NAME_BUF_LEN` bytes. The scratch buffer is zeroed first so a shorter
/// name never inherits a stale tail from the previous record.
fn read_name<M: ProcessMemory + ?Sized>(
    mem: &M,
    desc: &RemoteString,
    scratch: &mut [u8],
) -> Result<Vec<u16>> {
    scratch.fill(0);
    let len = (desc.length as usize).min(scratch.len());
    if len > 0 {
        mem.read_memory(desc.buffer, &mut scratch[..len])?;
    }
    Ok(scratch[..len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Returns the tail of `units` after the last backslash, if any.
fn strip_path(units: &[u16]) -> &[u16] {
    match units.iter().rposition(|&u| u == u16::from(b'\\')) {
        Some(pos) => &units[pos + 1..],
        None => units,
    }
}

/// Locates `module_name` on the loader list of the process whose
/// environment block sits at `peb_address`.
///
/// The name comparison is case-blind exact equality on the record's short
/// name after any path prefix is stripped. Returns a full copy of the
/// matching record, [`RemodError::ModuleNotFound`] once the chain returns
/// to the list head, or the first remote-read failure.
pub fn find_module<M: ProcessMemory + ?Sized>(
    mem: &M,
    peb_address: u64,
    module_name: &str,
) -> Result<ModuleRecord> {
    // The environment block holds the address of the loader data.
    let peb_raw = mem.read_exact(peb_address, PEB_READ_LEN)?;
    let ldr = ByteView::new(&peb_raw).u64_at(PEB_LDR)?;
    debug!("loader data at {ldr:#x}");

    // The loader data holds the in-memory-order list head. Only list
    // order matters for the traversal.
    let ldr_raw = mem.read_exact(ldr, LDR_READ_LEN)?;
    let list_head = ldr + LDR_IN_MEMORY_ORDER_LIST as u64;
    let mut link = ByteView::new(&ldr_raw).u64_at(LDR_IN_MEMORY_ORDER_LIST)?;

    let target: Vec<u16> = module_name.encode_utf16().collect();
    let mut scratch = vec![0u8; NAME_BUF_LEN];

    while link != list_head {
        // The links sit in the middle of the record; back up to its start
        // and copy the whole thing out.
        let record_base = link - ENTRY_IN_MEMORY_ORDER_LINKS as u64;
        let raw = mem.read_exact(record_base, ENTRY_READ_LEN)?;
        let view = ByteView::new(&raw);

        let base_name_desc = RemoteString::parse(&view, ENTRY_BASE_DLL_NAME)?;
        let units = read_name(mem, &base_name_desc, &mut scratch)?;
        let short = strip_path(&units);
        trace!("loader record {}", String::from_utf16_lossy(short));

        if pattern::eq_utf16_case_blind(short, &target) {
            let base_name = String::from_utf16_lossy(short);
            let full_name_desc = RemoteString::parse(&view, ENTRY_FULL_DLL_NAME)?;
            let full_units = read_name(mem, &full_name_desc, &mut scratch)?;

            let record = ModuleRecord {
                base: view.u64_at(ENTRY_DLL_BASE)?,
                entry_point: view.u64_at(ENTRY_ENTRY_POINT)?,
                image_size: view.u32_at(ENTRY_SIZE_OF_IMAGE)?,
                base_name,
                full_path: String::from_utf16_lossy(&full_units),
                base_name_desc,
                full_name_desc,
                flink: view.u64_at(ENTRY_IN_MEMORY_ORDER_LINKS)?,
                blink: view.u64_at(ENTRY_IN_MEMORY_ORDER_LINKS + 8)?,
            };
            debug!(
                "found {} at {:#x} ({} bytes)",
                record.base_name, record.base, record.image_size
            );
            return Ok(record);
        }

        link = view.u64_at(ENTRY_IN_MEMORY_ORDER_LINKS)?;
    }

    Err(RemodError::ModuleNotFound(module_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testutil::SparseMemory;

    const PEB: u64 = 0x7fff_0000;
    const LDR: u64 = 0x7fff_2000;

    /// Lays out a synthetic environment block, loader data, and a circular
    /// in-memory-order list of records with the given full paths.
    fn build_loader(modules: &[(&str, u64)]) -> SparseMemory {
        let mut mem = SparseMemory::new();
        mem.map_zeroed(PEB, PEB_READ_LEN);
        mem.patch_u64(PEB + PEB_LDR as u64, LDR);
        mem.map_zeroed(LDR, LDR_READ_LEN);

        let head = LDR + LDR_IN_MEMORY_ORDER_LIST as u64;
        let record_addr = |i: usize| 0x1_0000_0000u64 + (i as u64) * 0x1000;
        let name_addr = |i: usize| 0x2_0000_0000u64 + (i as u64) * 0x1000;

        for (i, (path, base)) in modules.iter().enumerate() {
            let addr = record_addr(i);
            mem.map_zeroed(addr, ENTRY_READ_LEN);

            let next = if i + 1 == modules.len() {
                head
            } else {
                record_addr(i + 1) + ENTRY_IN_MEMORY_ORDER_LINKS as u64
            };
            let prev = if i == 0 {
                head
            } else {
                record_addr(i - 1) + ENTRY_IN_MEMORY_ORDER_LINKS as u64
            };
            mem.patch_u64(addr + ENTRY_IN_MEMORY_ORDER_LINKS as u64, next);
            mem.patch_u64(addr + ENTRY_IN_MEMORY_ORDER_LINKS as u64 + 8, prev);
            mem.patch_u64(addr + ENTRY_DLL_BASE as u64, *base);
            mem.patch_u64(addr + ENTRY_ENTRY_POINT as u64, *base + 0x1234);
            mem.patch_u32(addr + ENTRY_SIZE_OF_IMAGE as u64, 0x9000 + i as u32);

            let units: Vec<u16> = path.encode_utf16().collect();
            let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
            mem.map_zeroed(name_addr(i), NAME_BUF_LEN);
            mem.patch(name_addr(i), &bytes);
            // Both descriptors point at the same buffer; the full path is
            // the whole string, the short name strips nothing here because
            // strip_path handles it during the walk.
            for field in [ENTRY_FULL_DLL_NAME, ENTRY_BASE_DLL_NAME] {
                mem.patch_u16(addr + field as u64, bytes.len() as u16);
                mem.patch_u16(addr + field as u64 + 2, bytes.len() as u16);
                mem.patch_u64(addr + field as u64 + 8, name_addr(i));
            }
        }

        if modules.is_empty() {
            mem.patch_u64(head, head);
        } else {
            mem.patch_u64(head, record_addr(0) + ENTRY_IN_MEMORY_ORDER_LINKS as u64);
        }
        mem
    }

    #[test]
    fn finds_module_case_blind() {
        let mem = build_loader(&[
            ("C:\\Windows\\System32\\ntdll.dll", 0x7ff8_0000_0000),
            ("C:\\Windows\\System32\\KERNEL32.DLL", 0x7ff8_1000_0000),
            ("C:\\app\\helper.dll", 0x7ff8_2000_0000),
        ]);

        let record = find_module(&mem, PEB, "kernel32.dll").unwrap();
        assert_eq!(record.base, 0x7ff8_1000_0000);
        assert_eq!(record.entry_point, 0x7ff8_1000_1234);
        assert_eq!(record.image_size, 0x9001);
        assert_eq!(record.base_name, "KERNEL32.DLL");
        assert_eq!(record.full_path, "C:\\Windows\\System32\\KERNEL32.DLL");
    }

    #[test]
    fn missing_module_is_not_found_after_one_pass() {
        let mem = build_loader(&[
            ("C:\\Windows\\System32\\ntdll.dll", 0x1000),
            ("C:\\Windows\\System32\\kernel32.dll", 0x2000),
        ]);

        let err = find_module(&mem, PEB, "absent.dll").unwrap_err();
        assert!(matches!(err, RemodError::ModuleNotFound(ref name) if name == "absent.dll"));
        // Termination bound: one full record read per list entry, no
        // revisiting after the chain returns to the head.
        assert_eq!(mem.reads_of_len(ENTRY_READ_LEN), 2);
    }

    #[test]
    fn empty_list_is_not_found() {
        let mem = build_loader(&[]);
        let err = find_module(&mem, PEB, "anything.dll").unwrap_err();
        assert!(matches!(err, RemodError::ModuleNotFound(_)));
        assert_eq!(mem.reads_of_len(ENTRY_READ_LEN), 0);
    }

    #[test]
    fn walk_stops_at_first_match() {
        let mem = build_loader(&[
            ("C:\\a\\dup.dll", 0xaaaa),
            ("C:\\b\\dup.dll", 0xbbbb),
        ]);
        let record = find_module(&mem, PEB, "dup.dll").unwrap();
        assert_eq!(record.base, 0xaaaa);
        assert_eq!(mem.reads_of_len(ENTRY_READ_LEN), 1);
    }

    #[test]
    fn torn_link_aborts_with_read_error() {
        let mut mem = build_loader(&[("C:\\x\\one.dll", 0x1000), ("C:\\x\\two.dll", 0x2000)]);
        // Point the first record's forward link into unmapped space, as if
        // the target unloaded a module mid-walk.
        mem.patch_u64(
            0x1_0000_0000 + ENTRY_IN_MEMORY_ORDER_LINKS as u64,
            0xdead_0000,
        );
        let err = find_module(&mem, PEB, "two.dll").unwrap_err();
        assert!(matches!(err, RemodError::RemoteRead(..)));
    }

    #[test]
    fn name_without_path_matches_verbatim() {
        let mem = build_loader(&[("plain.dll", 0x4000)]);
        let record = find_module(&mem, PEB, "PLAIN.DLL").unwrap();
        assert_eq!(record.base_name, "plain.dll");
    }
}

#[cfg(all(test, windows))]
mod live_tests {
    use super::*;
    use crate::process::{RemoteProcess, INSPECT_ACCESS};

    #[test]
    fn finds_ntdll_in_own_process() {
        let process = RemoteProcess::open(std::process::id(), INSPECT_ACCESS).unwrap();
        let peb = process.peb_address().unwrap();
        let record = find_module(&process, peb, "ntdll.dll").unwrap();
        assert!(record.base != 0);
        assert!(record.image_size > 0);
        assert!(record.base_name.eq_ignore_ascii_case("ntdll.dll"));
    }

    #[test]
    fn absent_module_reports_not_found() {
        let process = RemoteProcess::open(std::process::id(), INSPECT_ACCESS).unwrap();
        let peb = process.peb_address().unwrap();
        let err = find_module(&process, peb, "no-such-module-loaded.dll").unwrap_err();
        assert!(matches!(err, RemodError::ModuleNotFound(_)));
    }
}
