use std::io::Write;

use vm::Device;

/// Console device which buffers `PRN` output
///
/// Each emitted value becomes one decimal line. Buffering keeps the
/// machine core free of I/O; the caller decides when to [`flush`](
/// Console::flush) to the real console.
pub struct Console {
    stdout: Vec<u8>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Builds a new console with an empty output buffer
    pub fn new() -> Self {
        Self { stdout: vec![] }
    }

    /// Takes the `stdout` buffer, leaving it empty
    pub fn stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    /// Writes buffered output to the process `stdout`
    pub fn flush(&mut self) -> std::io::Result<()> {
        let out = self.stdout();
        if !out.is_empty() {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&out)?;
            stdout.flush()?;
        }
        Ok(())
    }
}

impl Device for Console {
    fn prn(&mut self, value: u8) {
        // Writes to a Vec cannot fail
        writeln!(&mut self.stdout, "{value}").unwrap();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prn_formats_decimal_lines() {
        let mut dev = Console::new();
        dev.prn(17);
        dev.prn(0);
        dev.prn(255);
        assert_eq!(dev.stdout(), b"17\n0\n255\n");
        assert!(dev.stdout().is_empty());
    }
}
