//! Judicial stage: opinion producers, raw-output parsing and fan-out/fan-in.

pub mod fanout;
pub mod parse;
pub mod producer;

pub use fanout::collect_opinions;
pub use parse::parse_opinion;
pub use producer::OpinionProducer;
