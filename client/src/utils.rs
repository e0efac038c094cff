use std::io::Write;
use std::path::Path;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

pub const BANNER: &str = r"
 ================================
   remod - remote module loader
 ================================
";

/// Checks if the given file exists.
pub fn check_file(file: &str) -> bool {
    Path::new(file).exists()
}

/// Initializes the logger with the specified verbosity level.
///
/// # Parameters
///
/// - `verbose` - A `u8` representing the verbosity level.
///    - `0` for `Info` level.
///    - `1` for `Debug` level.
///    - Any higher value for `Trace` level.
pub fn init_logger(verbose: u8) {
    let mut builder = Builder::new();
    let log_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    builder
        .filter(None, log_level)
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
            let level = match record.level() {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN ".yellow().bold(),
                Level::Info => "INFO ".green(),
                Level::Debug => "DEBUG".bright_black(),
                Level::Trace => "TRACE".blue(),
            };

            writeln!(buf, "[{}] {} [remod] {}", timestamp, level, record.args())
        })
        .init();
}

/// Parses a process ID in decimal, hex (`0x`), or octal (`0o` or a
/// leading zero) form.
pub fn parse_process_id(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = value.strip_prefix("0o").or_else(|| value.strip_prefix("0O")) {
        u32::from_str_radix(oct, 8).ok()
    } else if value.len() > 1 && value.starts_with('0') {
        u32::from_str_radix(&value[1..], 8).ok()
    } else {
        value.parse().ok()
    }
}

/// Resolves a process identifier to a pid, treating anything that is not
/// a number as an executable name.
#[cfg(windows)]
pub fn resolve_process(identifier: &str) -> remodx::Result<u32> {
    match parse_process_id(identifier) {
        Some(pid) => Ok(pid),
        None => remodx::find_process_by_name(identifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_hex_and_octal() {
        assert_eq!(parse_process_id("1234"), Some(1234));
        assert_eq!(parse_process_id("0x4d2"), Some(1234));
        assert_eq!(parse_process_id("0X4D2"), Some(1234));
        assert_eq!(parse_process_id("0o2322"), Some(1234));
        assert_eq!(parse_process_id("02322"), Some(1234));
        assert_eq!(parse_process_id("0"), Some(0));
    }

    #[test]
    fn names_are_not_numbers() {
        assert_eq!(parse_process_id("notepad.exe"), None);
        assert_eq!(parse_process_id("0xzz"), None);
        assert_eq!(parse_process_id(""), None);
    }
}
