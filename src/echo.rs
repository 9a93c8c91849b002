use std::io::Write;

use crate::handler::Diagnostics;
use crate::message::DecodedMessage;

pub struct UartEcho<W> {
    out: W,
    write_err: bool,
}

impl<W: Write> UartEcho<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            write_err: false,
        }
    }

    pub fn frame(status: u8, channel: u8, data0: u8, data1: u8) -> [u8; 8] {
        [b's', status, b'c', channel, b'd', data0, data1, b'.']
    }

    pub fn has_err(&self) -> bool {
        self.write_err
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Diagnostics for UartEcho<W> {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8) {
        let frame = Self::frame(status, channel, data0, data1);
        if let Err(e) = self.out.write_all(&frame) {
            if !self.write_err {
                tracing::error!("uart echo write: {:?}", e);
            }
            self.write_err = true;
        } else if self.write_err {
            tracing::info!("uart echo write resolved");
            self.write_err = false;
        }
    }
}

#[derive(Debug, Default)]
pub struct ActivityPin {
    high: bool,
    toggles: u64,
}

impl ActivityPin {
    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn toggles(&self) -> u64 {
        self.toggles
    }
}

impl Diagnostics for ActivityPin {
    fn report(&mut self, _status: u8, _channel: u8, _data0: u8, _data1: u8) {
        self.high = !self.high;
        self.toggles += 1;
    }
}

#[derive(Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }

        let msg = DecodedMessage {
            status,
            channel,
            data: [data0, data1],
        };
        let bytes = msg.to_bytes();

        if let Ok(midi) = wmidi::MidiMessage::try_from(&bytes[..]) {
            tracing::debug!("midi_in: {:?}", midi);
        } else {
            tracing::debug!("midi_in: {:02x?} ({:?})", bytes, msg.kind());
        }
    }
}

#[test]
fn echo_frame() {
    let mut echo = UartEcho::new(Vec::new());
    echo.report(0x9, 0, 0x3c, 0x40);
    echo.report(0x8, 2, 0x3c, 0x00);

    assert!(!echo.has_err());
    assert_eq!(
        echo.into_inner(),
        b"s\x09c\x00d\x3c\x40.s\x08c\x02d\x3c\x00.".to_vec()
    );
}

#[test]
fn echo_write_error_is_latched_until_a_write_succeeds() {
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

    let mut echo = UartEcho::new(Flaky {
        fail: true,
        out: Vec::new(),
    });
    echo.report(0x9, 0, 0x3c, 0x40);
    echo.report(0x9, 0, 0x3e, 0x40);
    assert!(echo.has_err());

    echo.out.fail = false;
    echo.report(0x8, 0, 0x3c, 0x00);
    assert!(!echo.has_err());
    assert_eq!(echo.into_inner().out, b"s\x08c\x00d\x3c\x00.".to_vec());
}

#[test]
fn activity_pin_toggles_per_message() {
    let mut pin = ActivityPin::default();
    assert!(!pin.is_high());

    pin.report(0x9, 0, 0x3c, 0x40);
    assert!(pin.is_high());

    pin.report(0xb, 0, 0x07, 0x64);
    assert!(!pin.is_high());
    assert_eq!(pin.toggles(), 2);
}

#[test]
fn tracing_diagnostics_with_and_without_debug() {
    let mut diagnostics = TracingDiagnostics;
    diagnostics.report(0x9, 0, 0x3c, 0x40);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        assert!(tracing::enabled!(tracing::Level::DEBUG));
        diagnostics.report(0x9, 0, 0x3c, 0x40);
        diagnostics.report(0xf, 8, 0x40, 0x00);
    });
}
