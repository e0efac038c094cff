use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use utils::{init_logger, BANNER};

mod cli;
mod utils;

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logger(args.verbose);
    println!("{BANNER}");

    run(&args)
}

#[cfg(windows)]
fn run(args: &Cli) -> ExitCode {
    use log::{error, info};

    use crate::cli::Commands;
    use crate::utils::{check_file, resolve_process};

    match &args.command {
        // Load a DLL into the target process.
        Commands::Inject { dll, process } => {
            // The target resolves the path in its own context, so hand it
            // a fully qualified name.
            let dll = match std::path::absolute(dll) {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(err) => {
                    error!("could not resolve full path for {dll}: {err}");
                    return ExitCode::FAILURE;
                }
            };
            if !check_file(&dll) {
                error!("file not found at the specified path: {dll}");
                return ExitCode::FAILURE;
            }

            let pid = match resolve_process(process) {
                Ok(pid) => pid,
                Err(err) => {
                    error!("{err}");
                    return ExitCode::FAILURE;
                }
            };

            match remodx::inject_dll(pid, &dll) {
                Ok(()) => {
                    info!("{dll} successfully injected into process {pid}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("could not load {dll} into process {pid}: {err}");
                    ExitCode::FAILURE
                }
            }
        }

        // Unload a module from the target process.
        Commands::Eject { module, process } => {
            let pid = match resolve_process(process) {
                Ok(pid) => pid,
                Err(err) => {
                    error!("{err}");
                    return ExitCode::FAILURE;
                }
            };

            match remodx::eject_dll(pid, module) {
                Ok(record) => {
                    info!(
                        "{} ({} bytes at {:#x}) successfully ejected from process {pid}, image {}",
                        record.base_name, record.image_size, record.base, record.full_path
                    );
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("could not unload {module} from process {pid}: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(not(windows))]
fn run(_args: &Cli) -> ExitCode {
    log::error!("remod drives the Windows module loader and only runs on Windows");
    ExitCode::FAILURE
}
