//! Domain models for tribunal.
//!
//! - `RunContext`: identity of one audit run
//! - `EvidenceRecord` / `EvidenceBundle`: collector output and its aggregation
//! - `CriterionSpec` / `Rubric` / `Persona`: static scoring configuration
//! - `JudicialOpinion` / `OpinionSet`: judge output per criterion
//! - `CriterionVerdict` / `FinalVerdict`: synthesis output

pub mod error;
pub mod evidence;
pub mod opinion;
pub mod rubric;
pub mod run;
pub mod verdict;

pub use error::{Result, TribunalError};
pub use evidence::{Citation, EvidenceBundle, EvidenceKind, EvidenceRecord, EvidenceStatus};
pub use opinion::{JudicialOpinion, OpinionSet, OpinionStatus};
pub use rubric::{validate_personas, CriterionSpec, Persona, Rubric, Stance};
pub use run::RunContext;
pub use verdict::{CriterionVerdict, FinalVerdict, ResolutionRule};
