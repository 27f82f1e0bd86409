//! CLI command handlers, one file per command.

mod adapters;
mod grab;
mod inspect;

pub use adapters::run_adapters;
pub use grab::{run_grab, GrabArgs};
pub use inspect::run_inspect;

#[cfg(test)]
pub(crate) use grab::{format_result, read_link_list, resolve_dest_dir};
