//! Service layer
//!
//! Services contain the per-project business logic. They drive the
//! analysis service and the scanner through traits so the pipeline can be
//! exercised without a live service.

mod analysis;
mod pipeline;

// Re-export traits
pub use analysis::AnalysisService;

// Re-export implementations
pub use analysis::SonarAnalysisService;
pub use pipeline::{PipelineReport, ProjectPipeline};
