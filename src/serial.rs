use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::READ_SIZE;

pub struct SerialIn {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    buf: Vec<u8>,
    read_err: bool,
    eof: bool,
}

impl SerialIn {
    pub async fn open(path: &Path) -> Result<Self> {
        if path == Path::new("-") {
            tracing::info!("serial in: reading stdin");
            return Ok(Self::new(tokio::io::stdin()));
        }

        let file = std::fs::File::open(path)
            .with_context(|| format!("opening serial input {}", path.display()))?;

        if make_raw(&file)
            .with_context(|| format!("configuring serial port {}", path.display()))?
        {
            tracing::info!("serial in: reading {} (raw mode)", path.display());
        } else {
            tracing::info!("serial in: reading {}", path.display());
        }

        Ok(Self::new(tokio::fs::File::from_std(file)))
    }

    pub fn new<R: AsyncRead + Unpin + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            buf: vec![0; READ_SIZE],
            read_err: false,
            eof: false,
        }
    }

    pub async fn recv(&mut self) -> Option<&[u8]> {
        loop {
            match self.reader.read(&mut self.buf).await {
                Ok(0) => {
                    tracing::info!("serial in: end of input");
                    self.eof = true;
                    return None;
                }
                Ok(n) => return Some(&self.buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::error!("serial in: {:?}", err);
                    self.read_err = true;
                    return None;
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !self.read_err && !self.eof
    }

    pub fn has_err(&self) -> bool {
        self.read_err
    }
}

// canonical mode holds bytes back until a newline and rewrites 0x0d, so a
// terminal has to be switched to raw before any midi goes through it
#[cfg(unix)]
fn make_raw(file: &std::fs::File) -> Result<bool> {
    use nix::{errno::Errno, sys::termios};

    let mut attrs = match termios::tcgetattr(file) {
        Ok(attrs) => attrs,
        Err(Errno::ENOTTY) => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    termios::cfmakeraw(&mut attrs);
    termios::tcsetattr(file, termios::SetArg::TCSANOW, &attrs)?;

    Ok(true)
}

#[cfg(not(unix))]
fn make_raw(_file: &std::fs::File) -> Result<bool> {
    Ok(false)
}

#[tokio::test]
async fn serial_in_reads_until_eof() {
    let line: &'static [u8] = &[0x90, 0x3c, 0x40];
    let mut serial = SerialIn::new(line);
    assert!(serial.is_open());

    let mut bytes = Vec::new();
    while let Some(chunk) = serial.recv().await {
        bytes.extend_from_slice(chunk);
    }

    assert_eq!(bytes, vec![0x90, 0x3c, 0x40]);
    assert!(!serial.is_open());
    assert!(!serial.has_err());
}

#[tokio::test]
async fn serial_in_missing_file() {
    let missing = Path::new("/nonexistent/serial-midi/input");
    assert!(SerialIn::open(missing).await.is_err());
}

#[tokio::test]
async fn serial_in_plain_file_is_left_alone() {
    let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"));
    let file = std::fs::File::open(path).unwrap();
    assert!(!make_raw(&file).unwrap());

    let mut serial = SerialIn::open(path).await.unwrap();
    let chunk = serial.recv().await.unwrap();
    assert!(chunk.starts_with(b"[package]"));
}

#[cfg(unix)]
#[tokio::test]
async fn serial_in_tty_passes_bytes_through_unchanged() {
    use nix::sys::termios::{self, InputFlags, LocalFlags};
    use std::io::Write;

    let pty = nix::pty::openpty(None, None).unwrap();
    let mut line = std::fs::File::from(pty.master);
    let port = std::fs::File::from(pty.slave);

    assert!(make_raw(&port).unwrap());
    let attrs = termios::tcgetattr(&port).unwrap();
    assert!(!attrs.local_flags.contains(LocalFlags::ICANON));
    assert!(!attrs.input_flags.contains(InputFlags::ICRNL));

    // no trailing newline, and a data byte that canonical mode turns into 0x0a
    line.write_all(&[0x90, 0x0d, 0x40]).unwrap();

    let mut serial = SerialIn::new(tokio::fs::File::from_std(port));
    let mut bytes = Vec::new();
    while bytes.len() < 3 {
        let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), serial.recv())
            .await
            .expect("bytes held back by the terminal")
            .unwrap();
        bytes.extend_from_slice(chunk);
    }

    assert_eq!(bytes, vec![0x90, 0x0d, 0x40]);
    drop(line);
}
