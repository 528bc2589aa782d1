//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod generation_repo;
pub mod job_repo;
pub mod output_repo;
pub mod session_repo;

pub use generation_repo::GenerationRepo;
pub use job_repo::JobRepo;
pub use output_repo::OutputRepo;
pub use session_repo::SessionRepo;
