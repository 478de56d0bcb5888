//! Row models for the SQLite backend.

mod message_row;

pub(crate) use message_row::MessageRow;
