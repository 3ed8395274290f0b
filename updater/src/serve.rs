//! Line-oriented host loop for `updater serve`.
//!
//! Each input line is `<caller> <command>`. Only `update` is dispatched; this
//! stands in for the chat host's command registration.
//!
//! Lines are read without read-ahead: an in-place restart inherits the input
//! descriptor, and the relaunched host must see every request not yet handled.

use std::io::{ErrorKind, Read};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::types::PrincipalId;
use crate::entry::{EntryPoint, Invocation};
use crate::io::responder::Responder;

pub const UPDATE_COMMAND: &str = "update";

/// Parsed host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub caller: PrincipalId,
    pub command: String,
}

/// Parse `<caller> <command>`; blank lines and `#` comments yield `None`.
pub fn parse_request(line: &str) -> Option<Request> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut parts = line.split_whitespace();
    let caller = parts.next()?;
    let command = parts.next()?;
    Some(Request {
        caller: PrincipalId::new(caller),
        command: command.to_string(),
    })
}

/// Read one `\n`-terminated line, consuming no bytes past the newline.
///
/// Returns `None` at EOF. A final line without a newline is still returned.
pub fn read_request_line<R: Read + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => return decode_line(bytes).map(Some),
            Ok(_) => bytes.push(byte[0]),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err).context("read request line"),
        }
    }
    if bytes.is_empty() {
        Ok(None)
    } else {
        decode_line(bytes).map(Some)
    }
}

fn decode_line(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).context("request line is not valid UTF-8")
}

/// Dispatch requests until EOF and return every invocation result in order.
pub fn serve<E, I>(entry: &E, mut input: I, responder: &mut dyn Responder) -> Result<Vec<Invocation>>
where
    E: EntryPoint + ?Sized,
    I: Read,
{
    let mut invocations = Vec::new();
    while let Some(line) = read_request_line(&mut input)? {
        let Some(request) = parse_request(&line) else {
            if !line.trim().is_empty() && !line.trim().starts_with('#') {
                warn!(line = %line, "malformed request line");
            }
            continue;
        };
        if request.command != UPDATE_COMMAND {
            warn!(command = %request.command, "unknown command");
            continue;
        }
        debug!(caller = %request.caller, "dispatching update");
        invocations.push(entry.invoke(&request.caller, responder)?);
    }
    Ok(invocations)
}
