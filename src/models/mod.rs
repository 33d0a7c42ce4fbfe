mod group;
mod merge_request;
mod pipeline;
mod project;
mod schedule;

pub use group::{access_level_label, Group, GroupMember};
pub use merge_request::MergeRequest;
pub use pipeline::{Job, Pipeline};
pub use project::{Project, Visibility};
pub use schedule::{
    PipelineSchedule, PipelineScheduleLastPipeline, PipelineScheduleOwner,
    PipelineScheduleVariable,
};
