//! Minimal command-line front end exercising the `adb` library: `devices`,
//! `shell <cmd> --serial S`, and `install <apk> --serial S`. Argument
//! parsing is hand-rolled on purpose — this binary exists to drive the
//! library, not to demonstrate a CLI-parsing crate.

use std::process::ExitCode;

use adb::{AdbError, Client, Config};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), AdbError> {
    let client = Client::new(Config::new());
    match args.first().map(String::as_str) {
        Some("devices") => cmd_devices(&client),
        Some("shell") => cmd_shell(&client, &args[1..]),
        Some("install") => cmd_install(&client, &args[1..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    eprintln!(
        "usage:\n  adb-cli devices\n  adb-cli shell <command> --serial <serial>\n  adb-cli install <apk-path> --serial <serial>"
    );
}

fn cmd_devices(client: &Client) -> Result<(), AdbError> {
    for device in client.devices()? {
        println!("{}\t{}", device.id, device.kind);
    }
    Ok(())
}

/// Split `rest` into the positional argument and an optional `--serial`
/// value, the only flag this demo needs to parse.
fn take_serial(rest: &[String]) -> (Vec<String>, Option<String>) {
    let mut positional = Vec::new();
    let mut serial = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        if arg == "--serial" {
            serial = iter.next().cloned();
        } else {
            positional.push(arg.clone());
        }
    }
    (positional, serial)
}

fn require_serial(serial: Option<String>) -> Result<String, AdbError> {
    serial.ok_or_else(|| AdbError::ConfigError("missing required --serial <serial>".into()))
}

fn cmd_shell(client: &Client, rest: &[String]) -> Result<(), AdbError> {
    let (positional, serial) = take_serial(rest);
    let serial = require_serial(serial)?;
    let command = positional.join(" ");
    let output = client.shell(&serial, &command)?;
    println!("{output}");
    Ok(())
}

fn cmd_install(client: &Client, rest: &[String]) -> Result<(), AdbError> {
    let (positional, serial) = take_serial(rest);
    let serial = require_serial(serial)?;
    let apk_path = positional
        .first()
        .ok_or_else(|| AdbError::ConfigError("missing required <apk-path>".into()))?;
    client.install(&serial, apk_path)?;
    println!("installed {apk_path} on {serial}");
    Ok(())
}
