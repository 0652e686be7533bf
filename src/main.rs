use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use termhook::config::{ConfigLoader, ConfigResult};
use termhook::{Config, ConsoleEcho, Hook, RelayResult, StopOnPattern};
use tracing::{debug, error};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "termhook",
    version,
    about = "Relay a serial device to the terminal, forwarding Ctrl-C to the device.",
    long_about = "Prints everything the device sends to stdout. Ctrl-C is sent to the device as \
                  a 0x03 byte instead of ending the program. With --interactive, keystrokes are \
                  forwarded to the device with the terminal in raw mode."
)]
struct Args {
    /// Serial device path, or an alias from [serial.port_aliases].
    #[arg(value_name = "DEVICE")]
    device: Option<String>,

    /// Line speed in baud.
    #[arg(value_name = "SPEED")]
    speed: Option<u32>,

    /// Forward local keystrokes to the device.
    #[arg(short, long)]
    interactive: bool,

    /// Stop relaying once PATTERN is seen in the device output.
    #[arg(long, value_name = "PATTERN")]
    stop_on: Option<String>,

    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let loader = match load_config(&args) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("termhook: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match loader.to_toml() {
            Ok(rendered) => {
                print!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("termhook: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let logging_ready = match termhook::logging::init(&loader.config().logging, args.verbose) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("termhook: logging disabled: {e}");
            false
        }
    };
    if let Some(ref path) = loader.config_path {
        debug!(path = %path.display(), "configuration loaded");
    }

    match relay(loader.config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "relay failed");
            if !logging_ready {
                eprintln!("termhook: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration and layer the command line over it.
fn load_config(args: &Args) -> ConfigResult<ConfigLoader> {
    let mut loader = match args.config {
        Some(ref path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };

    let config = loader.config_mut();
    if let Some(ref device) = args.device {
        config.serial.port = device.clone();
    }
    if let Some(speed) = args.speed {
        config.serial.baud = speed;
    }
    if args.interactive {
        config.relay.forward_stdin = true;
    }
    if let Some(ref pattern) = args.stop_on {
        config.relay.stop_on = Some(pattern.clone());
    }
    config.validate()?;

    Ok(loader)
}

/// Run one relay session, closing the device on every path.
fn relay(config: &Config) -> RelayResult<()> {
    let mut hook = Hook::new(config.hook_config())?;
    if let Some(pattern) = config.relay.stop_on.as_deref() {
        hook = hook.with_line_handler(StopOnPattern::new(pattern, ConsoleEcho::stdout()));
    }

    let result = hook.run();
    let closed = hook.close();
    result.and(closed)
}
