//! Report rendering and emission.

pub mod emitter;
pub mod render;

pub use emitter::{read_verdict, FsReportEmitter, ReportArtifacts, ReportEmitter};
pub use render::{render_report_md, render_summary_md};
