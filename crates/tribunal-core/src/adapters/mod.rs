//! Concrete collaborators used by the CLI.

pub mod chat;
pub mod command;

pub use chat::ChatOpinionProducer;
pub use command::CommandCollector;
