// stream1090 - fuses a raw 1090 MHz Mode S stream into per-aircraft state
// Copyright (C) 2017-2018  Datong Sun (dndx@idndx.com)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::net::TcpStream;
use std::path::Path;

/// Longest line kept, in bytes without the terminator. Raw frames
/// are at most 30 characters, anything near this is not a frame.
pub const MAX_LINE: usize = 1024;

/// A type for representing where raw frames come from
pub trait Source {
    /// Next line without its terminator, `None` at end of input.
    /// Lines that are not valid UTF-8 or longer than `MAX_LINE` come
    /// back as `InvalidData` and reading resumes after them.
    fn next_line(&mut self) -> Option<io::Result<String>>;
}

/// Newline separated text, dump1090 `--raw` style
pub struct LineSource<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            reader,
            buf: Vec::with_capacity(64),
        }
    }

    /// Consumes input up to and including the next newline
    fn skip_line(&mut self) -> io::Result<()> {
        loop {
            let (found, used) = {
                let available = self.reader.fill_buf()?;
                if available.is_empty() {
                    return Ok(());
                }

                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (true, i + 1),
                    None => (false, available.len()),
                }
            };

            self.reader.consume(used);
            if found {
                return Ok(());
            }
        }
    }
}

impl LineSource<BufReader<io::Stdin>> {
    pub fn stdin() -> Box<dyn Source> {
        info!("reading frames from stdin");
        Box::new(LineSource::new(BufReader::new(io::stdin())))
    }
}

impl LineSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn Source>> {
        let f = File::open(path.as_ref())?;

        info!("reading frames from {}", path.as_ref().display());
        Ok(Box::new(LineSource::new(BufReader::new(f))))
    }
}

impl LineSource<BufReader<TcpStream>> {
    pub fn connect(addr: &str) -> io::Result<Box<dyn Source>> {
        let s = TcpStream::connect(addr)?;

        info!("connected to raw feed at {}", addr);
        Ok(Box::new(LineSource::new(BufReader::new(s))))
    }
}

impl<R: BufRead> Source for LineSource<R> {
    fn next_line(&mut self) -> Option<io::Result<String>> {
        self.buf.clear();

        // room for a CRLF terminator after a full length line
        let limit = MAX_LINE as u64 + 2;
        let read = (&mut self.reader).take(limit).read_until(b'\n', &mut self.buf);

        match read {
            Ok(0) => None,
            Ok(n) => {
                let truncated = n as u64 == limit && self.buf.last() != Some(&b'\n');
                if truncated {
                    if let Err(e) = self.skip_line() {
                        return Some(Err(e));
                    }
                }

                while self.buf.last() == Some(&b'\n') || self.buf.last() == Some(&b'\r') {
                    self.buf.pop();
                }

                if truncated || self.buf.len() > MAX_LINE {
                    let msg = format!("line longer than {} bytes", MAX_LINE);
                    return Some(Err(io::Error::new(io::ErrorKind::InvalidData, msg)));
                }

                Some(String::from_utf8(self.buf.clone())
                         .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Frame text of a raw line: `*8D4840D6...;` gives `8D4840D6...`.
/// Lines not starting with `*` carry no frame.
pub fn frame_text(line: &str) -> Option<&str> {
    let line = line.trim();

    if !line.starts_with('*') {
        return None;
    }

    let line = &line[1..];
    Some(line.trim_end_matches(';').trim())
}
