pub mod assembler;
pub mod source;
pub mod types;

pub use assembler::{assemble, rank};
pub use source::load_projects;
pub use types::{BatchResult, FailurePolicy, ProjectInput, RankedProject, SkippedProject};
