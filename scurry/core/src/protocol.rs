//! Control Socket Line Protocol
//!
//! Everything scamper writes on an attached control socket is a
//! newline-terminated line. Each line falls into exactly one category:
//!
//! | Line             | Meaning                                          |
//! |------------------|--------------------------------------------------|
//! | `OK ...`         | Command accepted, nothing to do                  |
//! | `MORE`           | scamper will accept one more command             |
//! | `DATA <n>`       | The next line is an `n` byte result              |
//! | `ERR <message>`  | A command was rejected                           |
//! | anything else    | A JSON result object                             |

use crate::error::ProtocolError;

/// Sent once after connecting to switch scamper to JSON-lines output
pub const ATTACH_COMMAND: &str = "attach format json";

/// Prefix of a command acknowledgement
pub const OK_TOKEN: &str = "OK";

/// Exact line granting one command credit
pub const MORE_TOKEN: &str = "MORE";

/// Prefix of a result size announcement
pub const DATA_TOKEN: &str = "DATA";

/// Prefix of a rejection
pub const ERR_TOKEN: &str = "ERR";

/// A classified line from scamper
#[derive(Debug)]
pub enum ControlLine<'a> {
    /// Acknowledgement, discarded
    Ack,
    /// One more command may be sent
    Credit,
    /// Size announcement for the following result line
    Data(Result<usize, ProtocolError>),
    /// Rejection message with the `ERR` prefix removed
    Error(&'a str),
    /// JSON result payload
    Result(&'a str),
}

/// Classify a line received from scamper (without its terminator)
#[must_use]
pub fn classify(line: &str) -> ControlLine<'_> {
    if line.starts_with(OK_TOKEN) {
        ControlLine::Ack
    } else if line == MORE_TOKEN {
        ControlLine::Credit
    } else if let Some(rest) = line.strip_prefix(DATA_TOKEN) {
        ControlLine::Data(parse_data_length(line, rest))
    } else if let Some(rest) = line.strip_prefix(ERR_TOKEN) {
        ControlLine::Error(rest.trim_start())
    } else {
        ControlLine::Result(line)
    }
}

fn parse_data_length(line: &str, rest: &str) -> Result<usize, ProtocolError> {
    rest.split_whitespace()
        .next()
        .and_then(|len| len.parse().ok())
        .ok_or_else(|| ProtocolError::MalformedDataLength(line.to_string()))
}
