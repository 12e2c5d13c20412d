//! Core IMAP types.
//!
//! Status keywords, capabilities, response codes, sequence sets and the
//! mailbox selection context.

mod capability;
mod mailbox;
mod response_code;
mod sequence;
mod status;

pub use capability::{Capability, CapabilitySet};
pub use mailbox::{MailboxSelection, mailbox_names_equal};
pub use response_code::ResponseCode;
pub use sequence::{SequenceSet, SetKind};
pub use status::Status;
