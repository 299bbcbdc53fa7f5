//! Command transport to the simulator.
//!
//! # Wire format
//! One JSON object per line in each direction over a single TCP connection:
//! - request:  `{"command": "simulator/run", "arguments": {...}}`
//! - response: `{"result": ...}` or `{"error": "message"}`
//!
//! Every call is a blocking round trip; there is never more than one request
//! in flight.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Anything that can execute a named simulator command.
pub trait Transport {
    /// Send `command` with `arguments` and wait for its result.
    fn request(&mut self, command: &str, arguments: Value) -> Result<Value>;

    /// Bound every following blocking wait by `deadline` (`None` clears it).
    fn set_deadline(&mut self, _deadline: Option<Instant>) {}
}

#[derive(Serialize)]
struct Request<'a> {
    command: &'a str,
    arguments: &'a Value,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Newline-delimited JSON over one persistent TCP connection.
pub struct TcpTransport {
    addr: String,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    deadline: Option<Instant>,
}

impl TcpTransport {
    /// Connect to `addr` (`host:port`), giving up after `timeout`.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|source| connect_error(addr, source))?;

        let mut last_err = None;
        for candidate in resolved {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    let reader = BufReader::new(stream.try_clone()?);
                    tracing::debug!(%addr, "connected to simulator");
                    return Ok(Self {
                        addr: addr.to_owned(),
                        reader,
                        writer: BufWriter::new(stream),
                        deadline: None,
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        let source = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        });
        Err(connect_error(addr, source))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn read_response(&mut self, command: &str) -> Result<Response> {
        let timeout = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ClientError::DeadlineExceeded {
                        command: command.to_owned(),
                    });
                }
                Some(remaining)
            }
            None => None,
        };
        self.reader.get_ref().set_read_timeout(timeout)?;

        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return Err(ClientError::Disconnected),
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => return Ok(serde_json::from_str(line.trim())?),
                Err(e)
                    if self.deadline.is_some()
                        && matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(ClientError::DeadlineExceeded {
                        command: command.to_owned(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Transport for TcpTransport {
    fn request(&mut self, command: &str, arguments: Value) -> Result<Value> {
        serde_json::to_writer(
            &mut self.writer,
            &Request {
                command,
                arguments: &arguments,
            },
        )?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let response = self.read_response(command)?;
        match response.error {
            Some(message) => Err(ClientError::Remote {
                command: command.to_owned(),
                message,
            }),
            None => Ok(response.result),
        }
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }
}

fn connect_error(addr: &str, source: io::Error) -> ClientError {
    ClientError::Connect {
        addr: addr.to_owned(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
