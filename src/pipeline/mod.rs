pub mod evaluator;
pub mod report;

pub use evaluator::{rank, ranking_order, EvaluatedOpportunity, OpportunityPipeline};
pub use report::PipelineSummary;
