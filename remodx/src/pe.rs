//! Resolves named exports out of a module image in another process.
//!
//! The image is never mapped locally; every header and table is copied out
//! of the target with bounded reads and parsed field-by-field from the
//! owned copy. A resolver call either fills every requested slot or fails:
//! there is no partial credit, and the first failing remote read aborts
//! with that read's status code.

use log::debug;

use crate::memory::{ByteView, ProcessMemory, ProcessMemoryExt};
use crate::pattern;
use crate::{error::RemodError, Result};

const DOS_HEADER_LEN: usize = 64;
const DOS_E_LFANEW: usize = 0x3c;
/// The PE signature sits between e_lfanew and the COFF header.
const PE_SIGNATURE_LEN: u64 = 4;
const COFF_HEADER_LEN: usize = 20;
const COFF_MACHINE: usize = 0;

// PE32+ optional header.
const OPTIONAL_HEADER_LEN: usize = 240;
/// Offset of the data-directory table inside the optional header; entry 0
/// is the export directory.
const DATA_DIRECTORY: usize = 112;

const EXPORT_DIRECTORY_LEN: usize = 40;
const EXPORT_NUMBER_OF_FUNCTIONS: usize = 20;
const EXPORT_NUMBER_OF_NAMES: usize = 24;
const EXPORT_ADDRESS_OF_FUNCTIONS: usize = 28;
const EXPORT_ADDRESS_OF_NAMES: usize = 32;
const EXPORT_ADDRESS_OF_NAME_ORDINALS: usize = 36;

/// Longest exported name the resolver will read.
const EXPORT_NAME_MAX: usize = 256;

/// One routine to resolve: a name and the slot that receives its absolute
/// address in the target once found.
///
/// A batch of requests is resolved in a single export-table scan; the scan
/// stops as soon as every slot is filled.
#[derive(Debug)]
pub struct RoutineRequest<'a> {
    name: &'a str,
    address: Option<u64>,
}

impl<'a> RoutineRequest<'a> {
    pub fn new(name: &'a str) -> Self {
        Self { name, address: None }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The resolved absolute address, once [`resolve_exports`] succeeds.
    pub fn address(&self) -> Option<u64> {
        self.address
    }
}

/// Resolves every request against the export table of the module based at
/// `module_base` in the target, writing addresses into the request slots.
///
/// Walks DOS header, COFF header, and the PE32+ optional header to the
/// export directory, then copies the name-offset, ordinal, and
/// function-address arrays out whole before any comparison. A name only
/// resolves through its ordinal-indexed slot in the function-address
/// array. Names are compared case-blind and exactly. Fails with
/// [`RemodError::ExportsUnresolved`] if the scan completes with any slot
/// still empty.
pub fn resolve_exports<M: ProcessMemory + ?Sized>(
    mem: &M,
    module_base: u64,
    requests: &mut [RoutineRequest<'_>],
) -> Result<()> {
    if requests.is_empty() {
        return Ok(());
    }

    let dos_raw = mem.read_exact(module_base, DOS_HEADER_LEN)?;
    let e_lfanew = ByteView::new(&dos_raw).u32_at(DOS_E_LFANEW)? as u64;

    let coff_addr = module_base + e_lfanew + PE_SIGNATURE_LEN;
    let coff_raw = mem.read_exact(coff_addr, COFF_HEADER_LEN)?;
    debug!(
        "image at {module_base:#x}, machine {:#06x}",
        ByteView::new(&coff_raw).u16_at(COFF_MACHINE)?
    );

    let opt_addr = coff_addr + COFF_HEADER_LEN as u64;
    let opt_raw = mem.read_exact(opt_addr, OPTIONAL_HEADER_LEN)?;
    let export_rva = ByteView::new(&opt_raw).u32_at(DATA_DIRECTORY)? as u64;

    let dir_raw = mem.read_exact(module_base + export_rva, EXPORT_DIRECTORY_LEN)?;
    let dir = ByteView::new(&dir_raw);
    let number_of_functions = dir.u32_at(EXPORT_NUMBER_OF_FUNCTIONS)? as usize;
    let number_of_names = dir.u32_at(EXPORT_NUMBER_OF_NAMES)? as usize;
    let functions_rva = dir.u32_at(EXPORT_ADDRESS_OF_FUNCTIONS)? as u64;
    let names_rva = dir.u32_at(EXPORT_ADDRESS_OF_NAMES)? as u64;
    let ordinals_rva = dir.u32_at(EXPORT_ADDRESS_OF_NAME_ORDINALS)? as u64;

    // The three parallel arrays come out whole, sized from the remote
    // counts, before any name is compared.
    let names_raw = mem.read_exact(module_base + names_rva, number_of_names * 4)?;
    let functions_raw = mem.read_exact(module_base + functions_rva, number_of_functions * 4)?;
    let ordinals_raw = mem.read_exact(module_base + ordinals_rva, number_of_names * 2)?;

    let names: Vec<u32> = names_raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let functions: Vec<u32> = functions_raw
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let ordinals: Vec<u16> = ordinals_raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();

    let mut found = 0usize;
    let request_count = requests.len();
    let mut name_buf = [0u8; EXPORT_NAME_MAX];

    'scan: for i in 0..number_of_functions {
        for j in 0..number_of_names {
            if ordinals[j] as usize != i {
                continue;
            }

            mem.read_memory(module_base + names[j] as u64, &mut name_buf)?;
            let end = name_buf
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(EXPORT_NAME_MAX);
            let export_name = &name_buf[..end];

            for request in requests.iter_mut() {
                if request.address.is_none()
                    && pattern::eq_case_blind(export_name, request.name.as_bytes())
                {
                    let address = module_base + functions[i] as u64;
                    request.address = Some(address);
                    found += 1;
                    debug!("resolved {} at {address:#x}", request.name);

                    if found == request_count {
                        break 'scan;
                    }
                }
            }
        }
    }

    if found != requests.len() {
        return Err(RemodError::ExportsUnresolved(found, requests.len()));
    }
    Ok(())
}

/// Resolves a single routine and returns its absolute address.
pub fn resolve_export<M: ProcessMemory + ?Sized>(
    mem: &M,
    module_base: u64,
    name: &str,
) -> Result<u64> {
    let mut requests = [RoutineRequest::new(name)];
    resolve_exports(mem, module_base, &mut requests)?;
    requests[0]
        .address()
        .ok_or(RemodError::ExportsUnresolved(0, 1))
}


#[cfg(all(test, windows))]
mod live_tests {
    use super::*;
    use crate::loader;
    use crate::process::{RemoteProcess, INSPECT_ACCESS};

    #[test]
    fn resolves_loadlibrary_in_own_kernel32_twice() {
        let process = RemoteProcess::open(std::process::id(), INSPECT_ACCESS).unwrap();
        let peb = process.peb_address().unwrap();
        let kernel32 = loader::find_module(&process, peb, "kernel32.dll").unwrap();

        let first = resolve_export(&process, kernel32.base, "LoadLibraryW").unwrap();
        let second = resolve_export(&process, kernel32.base, "LoadLibraryW").unwrap();
        assert_eq!(first, second);
        assert!(first > kernel32.base);
        assert!(first < kernel32.base + kernel32.image_size as u64);
    }

    #[test]
    fn absent_export_is_a_partial_match() {
        let process = RemoteProcess::open(std::process::id(), INSPECT_ACCESS).unwrap();
        let peb = process.peb_address().unwrap();
        let kernel32 = loader::find_module(&process, peb, "kernel32.dll").unwrap();

        let mut requests = [
            RoutineRequest::new("LoadLibraryW"),
            RoutineRequest::new("DefinitelyNotExported"),
        ];
        let err = resolve_exports(&process, kernel32.base, &mut requests).unwrap_err();
        assert!(matches!(err, RemodError::ExportsUnresolved(1, 2)));
    }
}
