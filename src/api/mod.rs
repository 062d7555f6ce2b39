pub mod envelope;

pub use envelope::{encode, Envelope};
