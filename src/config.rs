use std::path::PathBuf;

use clap::Parser;

pub const READ_SIZE: usize = 256;

pub const DEFAULT_RING_SIZE: usize = 1024;

/// Decodes a raw serial midi byte stream and prints note-on events.
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
pub struct Args {
    /// Raw byte stream to decode: a file, a serial device node, or `-` for stdin
    #[clap(default_value = "-")]
    pub input: PathBuf,

    /// Write the debug echo frame for every decoded message to this file
    #[clap(short = 'e', long, value_parser)]
    pub echo: Option<PathBuf>,

    /// Capacity of the byte ring between the serial reader and the decoder
    #[clap(short = 'r', long, value_parser = ring_size, default_value_t = DEFAULT_RING_SIZE)]
    pub ring_size: usize,

    /// Log every decoded message
    #[clap(short = 'v', long, value_parser)]
    pub verbose: bool,
}

fn ring_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("ring size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[test]
fn default_args() {
    let args = Args::parse_from(["serial-midi"]);
    assert_eq!(args.input, PathBuf::from("-"));
    assert_eq!(args.echo, None);
    assert_eq!(args.ring_size, DEFAULT_RING_SIZE);
    assert!(!args.verbose);
}

#[test]
fn explicit_args() {
    let args = Args::parse_from([
        "serial-midi",
        "/dev/ttyUSB0",
        "--echo",
        "echo.bin",
        "-r",
        "64",
        "-v",
    ]);
    assert_eq!(args.input, PathBuf::from("/dev/ttyUSB0"));
    assert_eq!(args.echo, Some(PathBuf::from("echo.bin")));
    assert_eq!(args.ring_size, 64);
    assert!(args.verbose);
}

#[test]
fn zero_ring_size_rejected() {
    assert!(Args::try_parse_from(["serial-midi", "-r", "0"]).is_err());
}
