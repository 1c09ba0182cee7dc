// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

// loadimg: push a kernel image to a serial bootloader
mod config;
mod error;
mod loader;
mod progress;
mod protocol;
mod serial;

use clap::Parser;
use std::path::PathBuf;
use config::{LoadConfig, LoadSettings};
use error::LoadError;
use progress::{ConsoleProgress, NoProgress, Progress};
use serial::{LineSettings, RealSerialPort, SerialPort};

#[derive(Parser)]
#[command(name = "loadimg")]
#[command(about = "Upload a kernel image to a serial bootloader", long_about = None)]
struct Cli {
    /// Serial device (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    dev: Option<String>,

    /// Baud rate [default: 115200]
    #[arg(short, long, value_name = "BAUD")]
    rate: Option<u32>,

    /// Kernel image to upload
    #[arg(short, long, value_name = "FILE")]
    kernel: Option<PathBuf>,

    /// Load address, forwarded to the device as given [default: 80000]
    #[arg(short, long)]
    addr: Option<String>,

    /// Bytes per transport write [default: 16]
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,

    /// Delay in milliseconds after each chunk
    #[arg(long, default_value = "0", value_name = "MS")]
    chunk_delay: u64,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// Increase log verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> Result<LoadConfig, LoadError> {
        Ok(LoadConfig {
            line: LineSettings::parse(self.data_bits, &self.parity, self.stop_bits)?,
            device: self.dev,
            baud_rate: self.rate,
            image_path: self.kernel,
            load_address: self.addr,
            chunk_size: self.chunk_size,
            chunk_delay_ms: self.chunk_delay,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    // info carries the user-facing summary; -v raises to debug, -vv to trace
    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .quiet(quiet)
        .verbosity(2 + cli.verbose as usize)
        .init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let settings = match cli.into_config().and_then(LoadConfig::validate) {
        Ok(settings) => settings,
        Err(e) => fail(e),
    };

    log::info!("Serial device: {}", settings.device);
    log::info!("Baudrate: {}", settings.baud_rate);
    log::info!("Kernel image: {}", settings.image_path.display());
    log::info!("Load address: {}", settings.load_address);

    let mut progress: Box<dyn Progress> = if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::new())
    };

    match upload(&settings, progress.as_mut()) {
        Ok(summary) => {
            log::debug!("{} bytes in {} chunks handed to {}", summary.image_len, summary.chunks, settings.device);
            if !quiet {
                println!("...done!");
            }
        }
        Err(e) => fail(e),
    }
}

fn upload(settings: &LoadSettings, progress: &mut dyn Progress) -> Result<loader::TransferSummary, LoadError> {
    loader::transfer(
        settings,
        |device, baud_rate, line| {
            let port = RealSerialPort::open(device, baud_rate, line)?;
            Ok(Box::new(port) as Box<dyn SerialPort>)
        },
        progress,
    )
}

fn fail(e: LoadError) -> ! {
    if e.is_configuration() {
        eprintln!("Error: {} (see --help)", e);
    } else {
        eprintln!("Error: {}", e);
    }
    std::process::exit(1);
}
