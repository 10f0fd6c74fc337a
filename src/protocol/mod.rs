//! Protocol Module
//!
//! Decodes the RESP wire protocol just far enough to describe each unit,
//! while keeping the exact bytes for verbatim forwarding.
//!
//! ## Command Encodings
//!
//! ### Multi-bulk
//! ```text
//! *<N>\r\n
//! $<len>\r\n<len bytes>\r\n     (repeated N times, first one is the name)
//! ```
//! `$-1\r\n` is a null element and has no payload.
//!
//! ### Inline
//! ```text
//! NAME arg1 arg2\r\n
//! ```
//!
//! ## Response Units
//!
//! ```text
//! ┌─────┬──────────────────┬──────────────────────────────────────────┐
//! │ Tag │ Type             │ Shape                                    │
//! ├─────┼──────────────────┼──────────────────────────────────────────┤
//! │  +  │ simple string    │ line                                     │
//! │  -  │ error            │ line                                     │
//! │  :  │ integer          │ line                                     │
//! │  $  │ bulk string      │ <len>\r\n<bytes>\r\n, -1 = null          │
//! │  *  │ array            │ <N>\r\n + N units, -1 = null             │
//! │  _  │ null             │ line                                     │
//! │  ,  │ double           │ line                                     │
//! │  #  │ boolean          │ t / f                                    │
//! │  !  │ blob error       │ as bulk string                           │
//! │  =  │ verbatim string  │ as bulk string, 4 byte format prefix     │
//! │  (  │ big number       │ line                                     │
//! │  %  │ map              │ <N>\r\n + 2N units                       │
//! │  ~  │ set              │ as array                                 │
//! │  >  │ push             │ as array                                 │
//! │  |  │ attribute        │ <N>\r\n + 2N units, then the real value  │
//! └─────┴──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Anything else is kept as an opaque line so newer servers don't break
//! the relay.

mod command;
mod response;
mod codec;

pub use command::{Command, CommandEncoding};
pub use response::{Response, ResponseKind, ERROR_PREFIXES};
pub use codec::{
    encode_command, read_command, read_response, read_response_with_depth, write_frame,
    MAX_BULK_LEN, MAX_LINE_LEN, SUMMARY_LIMIT,
};
