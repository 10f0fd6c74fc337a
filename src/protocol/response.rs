//! Response definitions
//!
//! Represents decoded backend replies.

use bytes::Bytes;

/// Status-line prefixes that mark a reply as failed
pub const ERROR_PREFIXES: &[&str] = &[
    "ERR",
    "WRONGTYPE",
    "NOAUTH",
    "NOPERM",
    "NOSCRIPT",
    "READONLY",
    "BUSY",
    "EXECABORT",
    "LOADING",
    "OOM",
    "MISCONF",
];

/// Response unit types, keyed by their leading tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    SimpleString,
    Error,
    Integer,
    BulkString,
    Array,
    Null,
    Double,
    Boolean,
    BlobError,
    VerbatimString,
    BigNumber,
    Map,
    Set,
    Push,
    Attribute,
    /// A tag this decoder does not know
    Unknown(u8),
}

impl ResponseKind {
    /// Map a tag byte to its kind
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b'+' => ResponseKind::SimpleString,
            b'-' => ResponseKind::Error,
            b':' => ResponseKind::Integer,
            b'$' => ResponseKind::BulkString,
            b'*' => ResponseKind::Array,
            b'_' => ResponseKind::Null,
            b',' => ResponseKind::Double,
            b'#' => ResponseKind::Boolean,
            b'!' => ResponseKind::BlobError,
            b'=' => ResponseKind::VerbatimString,
            b'(' => ResponseKind::BigNumber,
            b'%' => ResponseKind::Map,
            b'~' => ResponseKind::Set,
            b'>' => ResponseKind::Push,
            b'|' => ResponseKind::Attribute,
            other => ResponseKind::Unknown(other),
        }
    }

    /// The tag byte that introduces this kind on the wire
    pub fn tag(self) -> u8 {
        match self {
            ResponseKind::SimpleString => b'+',
            ResponseKind::Error => b'-',
            ResponseKind::Integer => b':',
            ResponseKind::BulkString => b'$',
            ResponseKind::Array => b'*',
            ResponseKind::Null => b'_',
            ResponseKind::Double => b',',
            ResponseKind::Boolean => b'#',
            ResponseKind::BlobError => b'!',
            ResponseKind::VerbatimString => b'=',
            ResponseKind::BigNumber => b'(',
            ResponseKind::Map => b'%',
            ResponseKind::Set => b'~',
            ResponseKind::Push => b'>',
            ResponseKind::Attribute => b'|',
            ResponseKind::Unknown(tag) => tag,
        }
    }

    /// True for kinds made of nested units
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            ResponseKind::Array
                | ResponseKind::Map
                | ResponseKind::Set
                | ResponseKind::Push
                | ResponseKind::Attribute
        )
    }
}

/// A fully decoded response unit
#[derive(Debug, Clone)]
pub struct Response {
    /// Kind of the value unit. An attribute prefix is reported through
    /// `attributes`, never as the kind.
    pub kind: ResponseKind,

    /// Short human-readable digest, never the whole payload
    pub summary: String,

    /// Every byte consumed for this unit, nested units and attributes included
    pub raw: Bytes,

    /// Number of attribute metadata pairs that preceded the value
    pub attributes: usize,
}

impl Response {
    /// True if the reply reports a failure
    ///
    /// Error and blob error units always do. Simple status lines do when
    /// they start with one of [`ERROR_PREFIXES`].
    pub fn is_error(&self) -> bool {
        match self.kind {
            ResponseKind::Error | ResponseKind::BlobError => true,
            ResponseKind::SimpleString => ERROR_PREFIXES
                .iter()
                .any(|prefix| self.summary.starts_with(prefix)),
            _ => false,
        }
    }

    /// The summary, if the reply is an error
    pub fn error_message(&self) -> Option<&str> {
        self.is_error().then_some(self.summary.as_str())
    }

    /// True for a plain `+OK`
    pub fn is_ok(&self) -> bool {
        self.kind == ResponseKind::SimpleString && self.summary == "OK"
    }
}
