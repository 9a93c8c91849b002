use std::{
    fs::File,
    io::{BufWriter, Write},
};

use anyhow::{Context, Result};
use clap::Parser;

mod bridge;
mod config;
mod decoder;
mod echo;
mod handler;
mod message;
mod ring;
mod serial;

use config::Args;
use decoder::{DecoderState, MidiDecoder};
use echo::{ActivityPin, TracingDiagnostics, UartEcho};
use handler::NoteOnHandler;
use serial::SerialIn;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    // stdout is reserved for note_on lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let echo = match &args.echo {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating echo output {}", path.display()))?;
            Some(UartEcho::new(BufWriter::new(file)))
        }
        None => None,
    };

    let mut serial = SerialIn::open(&args.input).await?;

    let printer = NotePrinter::new(std::io::stdout());
    let diagnostics = (TracingDiagnostics, (ActivityPin::default(), echo));
    let mut decoder = MidiDecoder::new(printer, diagnostics);

    let count = bridge::run(&mut serial, &mut decoder, args.ring_size).await;

    if decoder.state() == DecoderState::ReceivingData {
        tracing::info!(
            "input ended inside a message ({} of 2 data bytes)",
            decoder.cursor()
        );
    }

    let pin = &decoder.diagnostics().1.0;
    tracing::info!(
        "decoded {} bytes: {} messages, {} note on, activity pin {}",
        count,
        pin.toggles(),
        decoder.handler().notes,
        if pin.is_high() { "high" } else { "low" }
    );

    let (_, (_, (_, echo))) = decoder.into_parts();
    if let Some(mut echo) = echo {
        echo.flush().context("flushing echo output")?;
        if echo.has_err() {
            tracing::warn!("echo output is incomplete");
        }
    }

    if serial.has_err() {
        anyhow::bail!("serial input failed");
    }

    Ok(())
}

struct NotePrinter<W> {
    out: W,
    notes: u64,
    write_err: bool,
}

impl<W: Write> NotePrinter<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            notes: 0,
            write_err: false,
        }
    }
}

impl<W: Write> NoteOnHandler for NotePrinter<W> {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.notes += 1;
        tracing::debug!("note_on: channel {} note {} velocity {}", channel, note, velocity);

        if let Err(e) = writeln!(
            self.out,
            "note_on channel={channel} note={note} velocity={velocity}"
        ) {
            if !self.write_err {
                tracing::error!("note_on write: {:?}", e);
            }
            self.write_err = true;
        } else if self.write_err {
            tracing::info!("note_on write resolved");
            self.write_err = false;
        }
    }
}

#[test]
fn note_printer() {
    let mut decoder = MidiDecoder::new(NotePrinter::new(Vec::new()), ());
    decoder.process_bytes(&[0x90, 0x3c, 0x40, 0x80, 0x3c, 0x00, 0x92, 0x40, 0x00]);

    let (printer, ()) = decoder.into_parts();
    assert_eq!(printer.notes, 2);
    assert_eq!(
        String::from_utf8(printer.out).unwrap(),
        "note_on channel=0 note=60 velocity=64\nnote_on channel=2 note=64 velocity=0\n"
    );
}

#[test]
fn note_printer_recovers_after_write_error() {
    struct Flaky {
        fail: bool,
        out: Vec<u8>,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.fail {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let mut printer = NotePrinter::new(Flaky {
        fail: true,
        out: Vec::new(),
    });
    printer.note_on(0, 60, 64);
    assert!(printer.write_err);

    printer.out.fail = false;
    printer.note_on(1, 62, 70);
    assert!(!printer.write_err);
    assert_eq!(printer.notes, 2);
    assert_eq!(
        String::from_utf8(printer.out.out).unwrap(),
        "note_on channel=1 note=62 velocity=70\n"
    );
}
