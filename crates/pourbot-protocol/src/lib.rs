//! `pourbot-protocol` – the sensing↔control message exchange.
//!
//! The two nodes speak plain text over one connection-oriented link, in a
//! strictly alternating request/response rhythm:
//!
//! | Direction | Payload | Meaning |
//! |---|---|---|
//! | control→sensing | arbitrary text | start centering + estimation cycle |
//! | sensing→control | `"0"` | not yet centered, keep searching |
//! | sensing→control | `"1"` | centered, stop search |
//! | sensing→control | decimal text | estimated volume (oz), unprompted |
//! | control→sensing | arbitrary text | pour announced, cycle over |
//!
//! # Modules
//!
//! - [`link`] – the [`Link`][link::Link] trait and
//!   [`StreamLink`][link::StreamLink] over any tokio byte stream (TCP in
//!   production, an in-memory duplex pair in tests).
//! - [`message`] – centering status bytes and the decimal volume payload.

pub mod link;
pub mod message;

pub use link::{ConnectRetry, Link, StreamLink};
pub use message::CenteringStatus;
