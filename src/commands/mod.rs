pub mod groups;
pub mod merge_requests;
pub mod pipelines;
pub mod projects;
pub mod schedules;

use crate::config::Settings;

/// Exit code for failed trigger/create/update actions. A "not found" lookup
/// is a soft failure and exits 0 instead.
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_OK: u8 = 0;

/// Project-scoped commands read the project from the global
/// `--project`/`GITLAB_PROJECT` setting.
fn require_project(settings: &Settings) -> anyhow::Result<&str> {
    settings.project.as_deref().ok_or_else(|| {
        anyhow::anyhow!("--project is required (set it via --project or GITLAB_PROJECT)")
    })
}
