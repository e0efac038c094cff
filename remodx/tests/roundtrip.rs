//! Full load/unload round trip against a sacrificial process.
//!
//! Needs a live target and a DLL on disk, so it only runs when asked:
//!
//! ```text
//! REMOD_TEST_DLL=C:\path\to\some.dll cargo test -p remodx -- --ignored
//! ```
//!
//! Any DLL with no side effects in `DllMain` works; the test spawns its
//! own notepad.exe as the target and kills it afterwards.

#![cfg(windows)]

use std::path::Path;
use std::process::{Child, Command};

use remodx::{eject_dll, find_module, inject_dll, RemodError, RemoteProcess, INSPECT_ACCESS};

struct Sacrifice(Child);

impl Drop for Sacrifice {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
#[ignore = "requires a sacrificial target process and REMOD_TEST_DLL pointing at a DLL on disk"]
fn injected_module_appears_on_the_loader_list_and_ejects() {
    let dll = std::env::var("REMOD_TEST_DLL").expect("set REMOD_TEST_DLL to a DLL path");
    let dll = std::path::absolute(&dll).expect("absolute path");
    let dll_str = dll.to_str().expect("utf-8 path");
    let short_name = Path::new(dll_str)
        .file_name()
        .and_then(|n| n.to_str())
        .expect("file name");

    let child = Sacrifice(
        Command::new("notepad.exe")
            .spawn()
            .expect("spawn sacrificial process"),
    );
    let pid = child.0.id();
    // Give the target a moment to finish initializing its loader.
    std::thread::sleep(std::time::Duration::from_millis(500));

    inject_dll(pid, dll_str).expect("inject");

    let process = RemoteProcess::open(pid, INSPECT_ACCESS).expect("open for inspection");
    let peb = process.peb_address().expect("peb");
    let record = find_module(&process, peb, short_name).expect("module on loader list");
    assert!(record.base != 0);
    assert!(record.full_path.eq_ignore_ascii_case(dll_str));
    drop(process);

    eject_dll(pid, short_name).expect("eject");

    let process = RemoteProcess::open(pid, INSPECT_ACCESS).expect("reopen for inspection");
    let peb = process.peb_address().expect("peb");
    let err = find_module(&process, peb, short_name).unwrap_err();
    assert!(matches!(err, RemodError::ModuleNotFound(_)));
}
