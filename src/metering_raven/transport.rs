use super::commands::Command;
use super::structs::Fragment;
use super::{ConnectionError, RavenError};
use crate::config::{RavenConfig, SerialConfig};
use crate::models::Reading;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};

/// Fragments longer than this are dropped and the reader resynchronizes
pub const MAX_FRAGMENT_LINES: usize = 64;

lazy_static! {
    static ref ROOT_OPEN_TAG: Regex =
        Regex::new(r"^<([A-Za-z_][A-Za-z0-9_.\-]*)\s*>").expect("valid root tag pattern");
    static ref BARE_OPEN_TAG: Regex =
        Regex::new(r"^<([A-Za-z_][A-Za-z0-9_.\-]*)\s*>$").expect("valid bare tag pattern");
}

/// Name of the element `line` starts with, if any
pub fn root_tag(line: &str) -> Option<String> {
    ROOT_OPEN_TAG
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Name of the root if `line` is an opening tag on its own, which starts a
/// multi line fragment
fn bare_open_tag(line: &str) -> Option<String> {
    BARE_OPEN_TAG
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Name of the root if `line` is a whole fragment. It has to hold at least one
/// child element, a lone `<Demand>0x1</Demand>` is a field line.
fn single_line_root(line: &str) -> Option<String> {
    let captures = ROOT_OPEN_TAG.captures(line)?;
    let tag = captures.get(1)?.as_str();
    let rest = &line[captures.get(0)?.end()..];

    if rest.starts_with('<') && !rest.starts_with("</") && line.ends_with(&format!("</{}>", tag)) {
        Some(tag.to_string())
    } else {
        None
    }
}

struct PendingFragment {
    tag: String,
    closing: String,
    lines: Vec<String>,
}

impl PendingFragment {
    fn open(tag: String, line: String) -> Self {
        PendingFragment {
            closing: format!("</{}>", tag),
            tag,
            lines: vec![line],
        }
    }
}

enum FrameState {
    /// Waiting for the next root
    Idle,
    Collecting(PendingFragment),
    /// Skipping the rest of an oversized fragment up to this closing tag
    Discarding(String),
}

/// Reassembles the line oriented tag stream of the gateway into fragments.
///
/// A fragment either starts with a line holding only its opening tag and
/// ends with the first line ending in the matching closing tag, or sits on a
/// single line with at least one child element. Everything else outside a
/// fragment is noise, which covers the tail of a fragment that was already
/// running when the port was opened.
pub struct FragmentReader<R> {
    inner: BufReader<R>,
    line: Vec<u8>,
    state: FrameState,
    closed: bool,
}

impl<R: Read> FragmentReader<R> {
    pub fn new(inner: R) -> Self {
        FragmentReader {
            inner: BufReader::new(inner),
            line: Vec::new(),
            state: FrameState::Idle,
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// `Ok(None)` when the read timed out, partial data stays buffered
    fn read_line(&mut self) -> Result<Option<String>, ConnectionError> {
        match self.inner.read_until(b'\n', &mut self.line) {
            Ok(0) if self.line.is_empty() => return Err(ConnectionError::Closed),
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(None);
            }
            Err(e) => return Err(ConnectionError::Io(e)),
        }

        let line = String::from_utf8_lossy(&self.line).trim().to_string();
        self.line.clear();
        Ok(Some(line))
    }

    /// Reads at most one line and returns a fragment if that line completed
    /// one. `Ok(None)` means "nothing complete yet", including timeouts.
    pub fn poll_fragment(&mut self) -> Result<Option<Fragment>, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        let line = match self.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Timed out waiting for line");
                return Ok(None);
            }
            Err(e) => {
                self.closed = true;
                if let FrameState::Collecting(pending) = std::mem::replace(&mut self.state, FrameState::Idle) {
                    warn!("Dropping incomplete {} fragment", pending.tag);
                }
                return Err(e);
            }
        };

        if line.is_empty() {
            return Ok(None);
        }

        Ok(self.push_line(line))
    }

    /// Blocks until a complete fragment is available
    pub fn next_fragment(&mut self) -> Result<Fragment, ConnectionError> {
        loop {
            if let Some(fragment) = self.poll_fragment()? {
                return Ok(fragment);
            }
        }
    }

    fn push_line(&mut self, line: String) -> Option<Fragment> {
        let state = std::mem::replace(&mut self.state, FrameState::Idle);

        // a new root always wins over whatever was in progress
        if let Some(tag) = bare_open_tag(&line) {
            match state {
                FrameState::Collecting(pending) => {
                    warn!("Dropping incomplete {} fragment, {} started", pending.tag, tag)
                }
                FrameState::Discarding(_) => debug!("Resynchronized on {}", tag),
                FrameState::Idle => {}
            }
            self.state = FrameState::Collecting(PendingFragment::open(tag, line));
            return None;
        }

        if let Some(tag) = single_line_root(&line) {
            if let FrameState::Collecting(pending) = state {
                warn!("Dropping incomplete {} fragment, {} started", pending.tag, tag);
            }
            debug!("Captured fragment {}", tag);
            return Some(Fragment { tag, xml: line });
        }

        match state {
            FrameState::Collecting(mut pending) => {
                let complete = line.ends_with(&pending.closing);
                pending.lines.push(line);

                if complete {
                    debug!("Captured fragment {}", pending.tag);
                    return Some(Fragment {
                        tag: pending.tag,
                        xml: pending.lines.join("\n"),
                    });
                }

                if pending.lines.len() > MAX_FRAGMENT_LINES {
                    warn!(
                        "Fragment {} exceeds {} lines, resynchronizing",
                        pending.tag, MAX_FRAGMENT_LINES
                    );
                    self.state = FrameState::Discarding(pending.closing);
                } else {
                    self.state = FrameState::Collecting(pending);
                }
                None
            }
            FrameState::Discarding(closing) => {
                if line.ends_with(&closing) {
                    debug!("Skipped the rest of an oversized fragment");
                } else {
                    self.state = FrameState::Discarding(closing);
                }
                None
            }
            FrameState::Idle => {
                debug!("Skipping line outside of a fragment: {}", line);
                None
            }
        }
    }
}

impl<R: Read> Iterator for FragmentReader<R> {
    type Item = Result<Fragment, ConnectionError>;

    /// Yields the terminal connection error once, then ends
    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        Some(self.next_fragment())
    }
}

/// Exclusive owner of the serial handle to one gateway.
pub struct Connection<P = Box<dyn SerialPort>> {
    reader: FragmentReader<P>,
    meter_mac_id: Option<String>,
}

impl Connection {
    pub fn open(config: &SerialConfig) -> Result<Self, ConnectionError> {
        info!("Opening RAVEn on {} at {} baud", config.port, config.baud_rate);

        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(config.timeout())
            .open()
            .map_err(|source| ConnectionError::Open {
                port: config.port.clone(),
                source,
            })?;

        Ok(Connection::from_port(port))
    }

    pub fn from_config(config: &RavenConfig) -> Result<Self, ConnectionError> {
        let connection = Connection::open(&config.serial)?;
        Ok(match &config.meter_mac_id {
            Some(meter) => connection.with_default_meter(meter.clone()),
            None => connection,
        })
    }
}

impl<P: Read + Write> Connection<P> {
    pub fn from_port(port: P) -> Self {
        Connection {
            reader: FragmentReader::new(port),
            meter_mac_id: None,
        }
    }

    /// MeterMacId used for commands that take one but did not set it
    pub fn with_default_meter(mut self, meter_mac_id: impl Into<String>) -> Self {
        self.meter_mac_id = Some(meter_mac_id.into());
        self
    }

    pub fn send(&mut self, command: &Command) -> Result<(), RavenError> {
        let xml = match &self.meter_mac_id {
            Some(meter) if command.accepts("MeterMacId") && !command.has_arg("MeterMacId") => command
                .clone()
                .arg("MeterMacId", meter.as_str())
                .to_xml()?,
            _ => command.to_xml()?,
        };

        debug!("Sending command {}", xml);
        let port = self.reader.get_mut();
        port.write_all(xml.as_bytes()).map_err(ConnectionError::Io)?;
        port.flush().map_err(ConnectionError::Io)?;
        Ok(())
    }

    pub fn poll_fragment(&mut self) -> Result<Option<Fragment>, ConnectionError> {
        self.reader.poll_fragment()
    }

    pub fn next_fragment(&mut self) -> Result<Fragment, ConnectionError> {
        self.reader.next_fragment()
    }

    pub fn next_reading(&mut self) -> Result<Reading, RavenError> {
        let fragment = self.next_fragment()?;
        Ok(fragment.decode()?)
    }

    /// Every decode failure is yielded as an error, the iterator only ends
    /// after the connection failed.
    pub fn readings(&mut self) -> Readings<'_, P> {
        Readings {
            connection: self,
            done: false,
        }
    }

    pub fn port(&mut self) -> &mut P {
        self.reader.get_mut()
    }

    pub fn into_port(self) -> P {
        self.reader.into_inner()
    }

    /// Drops the serial handle, any blocked reader on it fails
    pub fn close(self) {
        info!("Closing RAVEn connection");
    }
}

pub struct Readings<'a, P> {
    connection: &'a mut Connection<P>,
    done: bool,
}

impl<'a, P: Read + Write> Iterator for Readings<'a, P> {
    type Item = Result<Reading, RavenError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.connection.next_fragment() {
            Ok(fragment) => Some(fragment.decode().map_err(RavenError::from)),
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}
