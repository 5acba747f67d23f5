//! Command handling - parsing, dispatching and answering invocations

pub mod dispatcher;
pub mod parser;
pub mod responder;

pub use dispatcher::{CommandDispatcher, DispatchOutcome, FAILURE_NOTICE};
pub use parser::CommandLineParser;
pub use responder::{Responder, ResponseState};
