use std::io::{self, Write};

/// Accepts and discards every write, counting the bytes.
#[derive(Debug, Default)]
pub struct NullLink {
    written: u64,
}

impl NullLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl Write for NullLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
