//! Protocol codec
//!
//! Streaming decoders for commands and responses, plus the small encoder the
//! publisher uses to talk to its store.
//!
//! Every decoder appends each consumed byte to a single raw buffer in read
//! order, so `raw` is always the exact unit as it appeared on the wire.
//! Nothing is re-encoded on the forwarding path.

use std::io::{self, BufRead, Read, Write};
use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::{ProxyError, Result};
use super::{Command, CommandEncoding, Response, ResponseKind};

/// Largest bulk payload accepted (512 MB, the server's own ceiling)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Longest line accepted before giving up on finding its terminator (1 MB)
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Bulk payloads longer than this are cut in summaries
pub const SUMMARY_LIMIT: usize = 50;

// =============================================================================
// Line / payload primitives
// =============================================================================

fn eof_to_end(err: io::Error) -> ProxyError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ProxyError::EndOfStream
    } else {
        ProxyError::Io(err)
    }
}

/// Read one line, append it verbatim to `raw`, return it without the line end
fn read_line<R: BufRead>(reader: &mut R, raw: &mut BytesMut) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut line)
        .map_err(eof_to_end)?;

    if n == 0 {
        return Err(ProxyError::EndOfStream);
    }
    if line.last() != Some(&b'\n') {
        if line.len() >= MAX_LINE_LEN {
            return Err(ProxyError::decode(format!(
                "line exceeds {} bytes without a terminator",
                MAX_LINE_LEN
            )));
        }
        return Err(ProxyError::EndOfStream);
    }

    raw.extend_from_slice(&line);

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(line)
}

/// Read `len` payload bytes plus CRLF into `raw`, returning the payload's range
///
/// `raw` grows only with bytes actually received, never up front by the
/// declared length.
fn read_payload<R: Read>(reader: &mut R, len: usize, raw: &mut BytesMut) -> Result<Range<usize>> {
    let start = raw.len();
    let wanted = len as u64 + 2;

    let copied = io::copy(&mut reader.by_ref().take(wanted), &mut (&mut *raw).writer())
        .map_err(eof_to_end)?;
    if copied < wanted {
        return Err(ProxyError::EndOfStream);
    }

    if &raw[start + len..] != b"\r\n" {
        return Err(ProxyError::decode(format!(
            "bulk payload of {} bytes not terminated by CRLF",
            len
        )));
    }
    Ok(start..start + len)
}

/// Parse the decimal after the tag byte
fn parse_length(line: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(&line[1..])
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            ProxyError::decode(format!(
                "invalid {} length: {:?}",
                what,
                String::from_utf8_lossy(line)
            ))
        })
}

/// Bulk length: `None` for the `-1` null marker
fn bulk_len(line: &[u8]) -> Result<Option<usize>> {
    match parse_length(line, "bulk")? {
        -1 => Ok(None),
        len if len < 0 => Err(ProxyError::decode(format!("negative bulk length {}", len))),
        len if len > MAX_BULK_LEN => Err(ProxyError::decode(format!(
            "bulk length {} exceeds {} bytes",
            len, MAX_BULK_LEN
        ))),
        len => Ok(Some(len as usize)),
    }
}

/// Aggregate count: `None` for the `-1` null marker
fn aggregate_count(line: &[u8]) -> Result<Option<usize>> {
    match parse_length(line, "aggregate")? {
        -1 => Ok(None),
        count if count < 0 => Err(ProxyError::decode(format!(
            "negative aggregate count {}",
            count
        ))),
        count => Ok(Some(count as usize)),
    }
}

fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

// =============================================================================
// Command Decoding
// =============================================================================

/// Read one complete command from a client stream
///
/// Blocks until the command is complete. The first byte picks the
/// encoding: `*` is multi-bulk, anything else is an inline line.
pub fn read_command<R: BufRead>(reader: &mut R) -> Result<Command> {
    let mut raw = BytesMut::new();
    let line = read_line(reader, &mut raw)?;

    if line.first() == Some(&b'*') {
        read_multibulk_command(reader, &line, raw)
    } else {
        Ok(parse_inline_command(&line, raw))
    }
}

fn read_multibulk_command<R: BufRead>(
    reader: &mut R,
    header: &[u8],
    mut raw: BytesMut,
) -> Result<Command> {
    let count = parse_length(header, "multibulk")?;
    if count < 0 {
        return Err(ProxyError::decode(format!(
            "negative multibulk count {}",
            count
        )));
    }

    // Payload positions inside `raw`; sliced out once the buffer is frozen
    let mut parts: Vec<Option<Range<usize>>> = Vec::with_capacity((count as usize).min(64));
    for _ in 0..count {
        let line = read_line(reader, &mut raw)?;
        if line.first() != Some(&b'$') {
            return Err(ProxyError::decode(format!(
                "expected bulk string in multibulk command, got {:?}",
                String::from_utf8_lossy(&line)
            )));
        }
        match bulk_len(&line)? {
            None => parts.push(None),
            Some(len) => parts.push(Some(read_payload(reader, len, &mut raw)?)),
        }
    }

    let raw = raw.freeze();
    let mut parts = parts
        .into_iter()
        .map(|range| range.map(|r| raw.slice(r)).unwrap_or_default());

    let name = parts
        .next()
        .map(|name| String::from_utf8_lossy(&name).to_ascii_uppercase())
        .unwrap_or_default();
    let args = parts.collect();

    Ok(Command {
        name,
        args,
        raw,
        encoding: CommandEncoding::MultiBulk,
        argc: count as usize,
    })
}

fn parse_inline_command(line: &[u8], raw: BytesMut) -> Command {
    let mut tokens = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty());

    let name = tokens
        .next()
        .map(|name| String::from_utf8_lossy(name).to_ascii_uppercase())
        .unwrap_or_default();
    let args: Vec<Bytes> = tokens.map(Bytes::copy_from_slice).collect();
    let argc = if name.is_empty() { 0 } else { args.len() + 1 };

    Command {
        name,
        args,
        raw: raw.freeze(),
        encoding: CommandEncoding::Inline,
        argc,
    }
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Read one complete response unit with the default nesting limit
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    read_response_with_depth(reader, DEFAULT_MAX_DEPTH)
}

/// Units still owed by one open aggregate
struct Pending {
    remaining: usize,
    depth: usize,

    /// The units are the top-level value itself, not nested elements
    root: bool,
}

/// What a unit's first line says about it
enum Head {
    Value {
        kind: ResponseKind,
        summary: String,
        children: usize,
    },
    Attribute {
        pairs: usize,
    },
}

/// Read one complete response unit, nesting at most `max_depth` levels
///
/// Nested units are walked with an explicit stack, so memory use and not
/// the thread's call stack bounds how deep a reply can go.
pub fn read_response_with_depth<R: BufRead>(reader: &mut R, max_depth: usize) -> Result<Response> {
    let mut raw = BytesMut::new();
    let mut value: Option<(ResponseKind, String)> = None;
    let mut attributes = 0;

    let mut stack = vec![Pending {
        remaining: 1,
        depth: 1,
        root: true,
    }];

    while let Some(top) = stack.last_mut() {
        let (depth, root) = (top.depth, top.root);
        top.remaining -= 1;
        if top.remaining == 0 {
            stack.pop();
        }

        match read_head(reader, &mut raw, depth, max_depth)? {
            Head::Value {
                kind,
                summary,
                children,
            } => {
                if root {
                    value = Some((kind, summary));
                }
                if children > 0 {
                    stack.push(Pending {
                        remaining: children,
                        depth: depth + 1,
                        root: false,
                    });
                }
            }

            // The attribute describes the unit right after it
            Head::Attribute { pairs } => {
                let metadata = pair_units(pairs)?;
                if root {
                    attributes += pairs;
                    stack.push(Pending {
                        remaining: 1,
                        depth: depth + 1,
                        root: true,
                    });
                    if metadata > 0 {
                        stack.push(Pending {
                            remaining: metadata,
                            depth: depth + 1,
                            root: false,
                        });
                    }
                } else {
                    stack.push(Pending {
                        remaining: metadata + 1,
                        depth: depth + 1,
                        root: false,
                    });
                }
            }
        }
    }

    let (kind, summary) = value.ok_or_else(|| ProxyError::decode("response without a value"))?;
    Ok(Response {
        kind,
        summary,
        raw: raw.freeze(),
        attributes,
    })
}

/// Read a unit's header line, and its payload for bulk kinds
fn read_head<R: BufRead>(
    reader: &mut R,
    raw: &mut BytesMut,
    depth: usize,
    max_depth: usize,
) -> Result<Head> {
    if depth > max_depth {
        return Err(ProxyError::decode(format!(
            "response nested deeper than {} levels",
            max_depth
        )));
    }

    let line = read_line(reader, raw)?;
    let Some(&tag) = line.first() else {
        return Err(ProxyError::decode("empty response line"));
    };
    let kind = ResponseKind::from_tag(tag);

    let (summary, children) = match kind {
        ResponseKind::SimpleString
        | ResponseKind::Error
        | ResponseKind::Integer
        | ResponseKind::Double
        | ResponseKind::BigNumber => (trimmed(&line[1..]), 0),

        ResponseKind::Null => ("(nil)".to_string(), 0),

        ResponseKind::Boolean => match trimmed(&line[1..]).as_str() {
            "t" => ("true".to_string(), 0),
            "f" => ("false".to_string(), 0),
            other => {
                return Err(ProxyError::decode(format!("invalid boolean {:?}", other)));
            }
        },

        ResponseKind::BulkString | ResponseKind::BlobError | ResponseKind::VerbatimString => {
            match bulk_len(&line)? {
                None => ("(nil)".to_string(), 0),
                Some(len) => {
                    let range = read_payload(reader, len, raw)?;
                    let content = &raw[range];
                    let content = if kind == ResponseKind::VerbatimString {
                        // `txt:` / `mkd:` format prefix
                        &content[content.len().min(4)..]
                    } else {
                        content
                    };
                    (bulk_summary(content), 0)
                }
            }
        }

        ResponseKind::Array | ResponseKind::Set | ResponseKind::Push => {
            match aggregate_count(&line)? {
                None => ("(nil)".to_string(), 0),
                Some(count) => (aggregate_summary(kind, count), count),
            }
        }

        ResponseKind::Map => match aggregate_count(&line)? {
            None => ("(nil)".to_string(), 0),
            Some(count) => (aggregate_summary(kind, count), pair_units(count)?),
        },

        ResponseKind::Attribute => {
            let pairs = aggregate_count(&line)?
                .ok_or_else(|| ProxyError::decode("null attribute count"))?;
            return Ok(Head::Attribute { pairs });
        }

        ResponseKind::Unknown(tag) => (format!("{}{}", tag as char, trimmed(&line[1..])), 0),
    };

    Ok(Head::Value {
        kind,
        summary,
        children,
    })
}

fn pair_units(pairs: usize) -> Result<usize> {
    pairs
        .checked_mul(2)
        .ok_or_else(|| ProxyError::decode(format!("pair count {} overflows", pairs)))
}

fn bulk_summary(content: &[u8]) -> String {
    if content.len() > SUMMARY_LIMIT {
        format!("{}…", String::from_utf8_lossy(&content[..SUMMARY_LIMIT]))
    } else {
        String::from_utf8_lossy(content).into_owned()
    }
}

fn aggregate_summary(kind: ResponseKind, count: usize) -> String {
    let (empty, noun) = match kind {
        ResponseKind::Map => ("(empty map)", "entries"),
        ResponseKind::Set => ("(empty set)", "members"),
        _ => ("(empty array)", "elements"),
    };
    if count == 0 {
        empty.to_string()
    } else {
        format!("({} {})", count, noun)
    }
}

// =============================================================================
// Encoding / stream helpers
// =============================================================================

/// Encode a command as a multi-bulk frame
pub fn encode_command<A: AsRef<[u8]>>(parts: &[A]) -> Vec<u8> {
    let payload: usize = parts.iter().map(|p| p.as_ref().len() + 16).sum();
    let mut message = Vec::with_capacity(16 + payload);

    message.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        let part = part.as_ref();
        message.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        message.extend_from_slice(part);
        message.extend_from_slice(b"\r\n");
    }

    message
}

/// Write a frame verbatim and flush it
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame)?;
    writer.flush()
}
