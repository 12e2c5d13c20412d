//! IMAP response parser.
//!
//! [`lexer`] tokenizes raw bytes; [`response`] builds typed responses.

pub mod lexer;
pub mod response;

pub use response::{FetchItem, Response, ResponseParser, UntaggedResponse};
