pub mod command;
pub mod docker;
pub mod reconstruct;
pub mod stream;

pub use docker::{Executor, StackAction, StackSummary};
pub use stream::{OutputStream, Tag};
