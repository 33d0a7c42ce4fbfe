mod client;
mod groups;
mod merge_requests;
mod pipelines;
mod projects;
mod schedules;

pub use client::GitLabClient;
pub use groups::{assemble_group_forest, GroupLookup};
pub use merge_requests::MergeRequestQuery;
pub use pipelines::PipelineQuery;
