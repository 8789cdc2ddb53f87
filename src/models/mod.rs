pub mod job;
pub mod loaders;
pub mod profile;
pub mod question;
pub mod record;

pub use job::{JobListing, SearchCriteria};
pub use loaders::load_profile;
pub use profile::{DocumentRef, KnowledgeProfile};
pub use question::{AnswerKind, AnswerValue, Confidence, Question, ResolvedAnswer};
pub use record::{CandidacyRecord, CandidacyStatus};
