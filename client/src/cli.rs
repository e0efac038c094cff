use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::utils::BANNER;

/// The main command-line interface struct.
#[derive(Parser)]
#[clap(author, about = "remod - remote module loader", long_about = BANNER)]
pub struct Cli {
    /// The command to be executed.
    #[command(subcommand)]
    pub command: Commands,

    /// Activate verbose mode (-v, -vv for additional levels)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Enum representing the available top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Load a DLL into a running process.
    Inject {
        /// Path to the DLL that will be loaded.
        #[arg(long, short, required = true, value_hint = ValueHint::FilePath)]
        dll: String,

        /// Process name or ID (decimal, hex, or octal). If multiple
        /// processes share a name, use the ID.
        #[arg(long, short, required = true)]
        process: String,
    },

    /// Unload a DLL from a running process.
    Eject {
        /// Short name of the module to unload, e.g. helper.dll.
        #[arg(long, short, required = true)]
        module: String,

        /// Process name or ID (decimal, hex, or octal). If multiple
        /// processes share a name, use the ID.
        #[arg(long, short, required = true)]
        process: String,
    },
}
