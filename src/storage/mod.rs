//! Storage for fetched content.
//!
//! [`content`] names things; [`Sink`] implementations put the bytes somewhere.

pub mod content;
mod dropbox;
mod local;
mod memory;
mod sink;

pub use dropbox::{DropboxAccount, DropboxName, DropboxSink};
pub use local::LocalSink;
pub use memory::MemorySink;
pub use sink::Sink;
