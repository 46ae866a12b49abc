//! Line-oriented IPC over pipes.
//!
//! Requests and responses are single JSON lines. Reads and writes retry on
//! `EINTR` so a signal delivered to the coordinator never tears a message.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

/// Pipe buffer size. Jobs carry whole assets, so lines are often large.
const BUFFER_SIZE: usize = 256 * 1024;

/// An owned pipe end with `EINTR`-safe `Read`/`Write`.
pub struct PipeFd {
    fd: OwnedFd,
}

impl PipeFd {
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Take ownership of a raw descriptor.
    ///
    /// # Safety
    /// `fd` must be open and not owned by anything else.
    pub unsafe fn from_raw(fd: RawFd) -> Self {
        Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        }
    }
}

impl From<OwnedFd> for PipeFd {
    fn from(fd: OwnedFd) -> Self {
        Self::new(fd)
    }
}

impl AsFd for PipeFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for PipeFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Read for PipeFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::read(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }
}

impl Write for PipeFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::write(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Create an anonymous pipe, returning `(read end, write end)`.
pub fn pipe() -> io::Result<(PipeFd, PipeFd)> {
    let (read, write) =
        nix::unistd::pipe().map_err(|e| io::Error::from_raw_os_error(e as i32))?;
    Ok((PipeFd::new(read), PipeFd::new(write)))
}

/// Buffered reader yielding one line at a time.
pub struct LineReader {
    reader: BufReader<PipeFd>,
    line: String,
}

impl LineReader {
    pub fn new(fd: PipeFd) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, fd),
            line: String::with_capacity(4096),
        }
    }

    /// Read the next line without its terminator; `None` at EOF.
    pub fn read_line(&mut self) -> io::Result<Option<&str>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        let trimmed = self.line.trim_end_matches(['\n', '\r']).len();
        self.line.truncate(trimmed);
        Ok(Some(&self.line))
    }
}

/// Buffered writer that flushes after every line.
pub struct LineWriter {
    writer: BufWriter<PipeFd>,
}

impl LineWriter {
    pub fn new(fd: PipeFd) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_SIZE, fd),
        }
    }

    /// Write `line`, adding the terminator when missing, then flush.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_roundtrip_through_pipe() {
        let (read, write) = pipe().unwrap();
        let mut reader = LineReader::new(read);
        let mut writer = LineWriter::new(write);

        writer.write_line("first").unwrap();
        writer.write_line("second\n").unwrap();
        writer.write_line("").unwrap();
        drop(writer);

        assert_eq!(reader.read_line().unwrap(), Some("first"));
        assert_eq!(reader.read_line().unwrap(), Some("second"));
        assert_eq!(reader.read_line().unwrap(), Some(""));
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let (read, write) = pipe().unwrap();
        let mut reader = LineReader::new(read);
        let mut raw = write;
        raw.write_all(b"{\"type\":\"exit\"}\r\nnext\n").unwrap();
        drop(raw);

        assert_eq!(reader.read_line().unwrap(), Some("{\"type\":\"exit\"}"));
        assert_eq!(reader.read_line().unwrap(), Some("next"));
    }

    #[test]
    fn test_large_line() {
        let (read, write) = pipe().unwrap();
        let line = "x".repeat(BUFFER_SIZE * 2 + 17);
        let expected = line.clone();
        let writer = std::thread::spawn(move || {
            let mut writer = LineWriter::new(write);
            writer.write_line(&line).unwrap();
        });

        let mut reader = LineReader::new(read);
        assert_eq!(reader.read_line().unwrap().map(str::len), Some(expected.len()));
        writer.join().unwrap();
    }
}
