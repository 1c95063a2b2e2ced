//! Synthesis: precedence rules, policies and remediation.

pub mod engine;
pub mod policy;
pub mod remediation;

pub use engine::{finalize, round_half_up, SynthesisEngine};
pub use policy::{
    BundleCitationCheck, CitationCheck, KeywordSecurityPredicate, SecurityPredicate,
    SynthesisPolicy,
};
