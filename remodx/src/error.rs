use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, RemodError>;

/// Errors produced by the remote load/unload engine.
///
/// Every variant that wraps an OS failure carries the raw status code from
/// the failing call so the outermost layer can print the failing stage and
/// the code verbatim. Nothing in the engine retries; each of these is
/// terminal for the current run.
#[derive(Debug, Error)]
pub enum RemodError {
    /// The privilege could not be enabled on the caller's own token.
    ///
    /// * `{0}` - The privilege name that was requested.
    /// * `{1}` - The status code returned by the failing call.
    #[error("could not enable privilege {0}, status {1}")]
    Privilege(String, u32),

    /// The target process could not be opened with the required access.
    ///
    /// * `{0}` - The process id.
    /// * `{1}` - The status code returned by the failing call.
    #[error("could not open process {0}, status {1}")]
    ProcessOpen(u32, u32),

    /// No running process matched the supplied executable name.
    ///
    /// * `{0}` - The name that was searched for.
    #[error("no process found with executable name {0}")]
    ProcessNotFound(String),

    /// Taking a snapshot of the running processes failed.
    ///
    /// * `{0}` - The status code returned by the failing call.
    #[error("process snapshot failed, status {0}")]
    Snapshot(u32),

    /// Querying the target's basic process information failed.
    ///
    /// * `{0}` - The NTSTATUS returned by the query.
    #[error("querying target process information failed, status {0:#010x}")]
    ProcessQuery(i32),

    /// The target reported a null environment block address.
    #[error("target process reports no environment block")]
    PebUnavailable,

    /// The named module was not on the target's loader list.
    ///
    /// * `{0}` - The module name that was searched for.
    #[error("module {0} not found in target process")]
    ModuleNotFound(String),

    /// A read from the target's address space failed or came back short.
    ///
    /// * `{0}` - The remote address.
    /// * `{1}` - The number of bytes requested.
    /// * `{2}` - The status code returned by the failing call.
    #[error("reading {1} bytes at {0:#x} in the target process failed, status {2}")]
    RemoteRead(u64, usize, u32),

    /// A structure field fell outside the buffer copied from the target.
    ///
    /// * `{0}` - The field offset.
    /// * `{1}` - The field length.
    /// * `{2}` - The size of the copied buffer.
    #[error("field at offset {0:#x} (length {1}) lies outside a {2}-byte buffer")]
    FieldOutOfRange(usize, usize, usize),

    /// The export scan completed without resolving every requested routine.
    ///
    /// * `{0}` - The number of routines that were resolved.
    /// * `{1}` - The number of routines that were requested.
    #[error("only {0} of {1} requested exports were found")]
    ExportsUnresolved(usize, usize),

    /// Allocating pages in the target's address space failed.
    ///
    /// * `{0}` - The number of bytes requested.
    /// * `{1}` - The status code returned by the failing call.
    #[error("allocating {0} bytes in the target process failed, status {1}")]
    RemoteAlloc(usize, u32),

    /// A write into the target's address space failed or was cut short.
    ///
    /// * `{0}` - The remote address.
    /// * `{1}` - The number of bytes to write.
    /// * `{2}` - The status code returned by the failing call.
    #[error("writing {1} bytes at {0:#x} in the target process failed, status {2}")]
    RemoteWrite(u64, usize, u32),

    /// The thread could not be created in the target process.
    ///
    /// * `{0}` - The status code returned by the failing call.
    #[error("creating the remote thread failed, status {0}")]
    ThreadCreate(u32),

    /// Waiting on the remote thread failed.
    ///
    /// * `{0}` - The status code returned by the failing call.
    #[error("waiting for the remote thread failed, status {0}")]
    ThreadWait(u32),

    /// The remote thread's exit value could not be retrieved.
    ///
    /// * `{0}` - The status code returned by the failing call.
    #[error("reading the remote thread exit code failed, status {0}")]
    ExitCodeRead(u32),

    /// The invoked routine ran but reported failure through its exit value.
    ///
    /// * `{0}` - The name of the routine that was invoked.
    #[error("{0} reported failure in the target process")]
    RemoteRoutineFailed(&'static str),
}
