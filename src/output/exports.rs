use anyhow::Result;
use serde::Serialize;

use crate::models::{Group, Job, MergeRequest, Pipeline, PipelineSchedule, Project};

/// Pretty-printed JSON (2-space indent) for any serializable payload.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::Writer::from_writer(Vec::new())
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

pub fn groups_csv(groups: &[Group], show_members: bool) -> Result<String> {
    let mut writer = csv_writer();

    if show_members {
        writer.write_record([
            "Group",
            "Username",
            "Name",
            "Role",
            "User Status",
            "Membership Status",
        ])?;
        for group in groups {
            write_member_records(&mut writer, group)?;
        }
    } else {
        writer.write_record(["Group Path", "Group ID"])?;
        for group in groups {
            write_group_records(&mut writer, group)?;
        }
    }

    finish_csv(writer)
}

fn write_member_records(writer: &mut csv::Writer<Vec<u8>>, group: &Group) -> Result<()> {
    for member in &group.members {
        writer.write_record([
            group.full_path.clone(),
            member.username.clone(),
            member.name.clone(),
            member.access_level_description.clone(),
            member.state.clone(),
            member.membership_state.clone(),
        ])?;
    }
    for subgroup in &group.subgroups {
        write_member_records(writer, subgroup)?;
    }
    Ok(())
}

fn write_group_records(writer: &mut csv::Writer<Vec<u8>>, group: &Group) -> Result<()> {
    writer.write_record([group.full_path.clone(), group.id.to_string()])?;
    for subgroup in &group.subgroups {
        write_group_records(writer, subgroup)?;
    }
    Ok(())
}

pub fn projects_csv(projects: &[Project]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(["Path", "Visibility", "Stars", "Forks", "Description", "URL"])?;
    for project in projects {
        writer.write_record([
            project.path_with_namespace.clone(),
            project.visibility.to_string(),
            project.star_count.to_string(),
            project.forks_count.to_string(),
            project.description.clone().unwrap_or_default(),
            project.web_url.clone(),
        ])?;
    }
    finish_csv(writer)
}

pub fn merge_requests_csv(mrs: &[MergeRequest]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record([
        "IID",
        "Title",
        "Author",
        "State",
        "Source Branch",
        "Target Branch",
        "Draft",
        "URL",
    ])?;
    for mr in mrs {
        writer.write_record([
            mr.iid.to_string(),
            mr.title.clone(),
            mr.author.clone(),
            mr.state.clone(),
            mr.source_branch.clone(),
            mr.target_branch.clone(),
            yes_no(mr.is_draft()),
            mr.web_url.clone(),
        ])?;
    }
    finish_csv(writer)
}

pub fn pipelines_csv(pipelines: &[Pipeline]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(["ID", "Status", "Ref", "SHA", "Duration", "Created", "URL"])?;
    for pipeline in pipelines {
        writer.write_record([
            pipeline.id.to_string(),
            pipeline.status.clone(),
            pipeline.ref_.clone(),
            pipeline.sha.chars().take(8).collect(),
            pipeline
                .duration
                .map_or_else(String::new, |secs| secs.to_string()),
            pipeline.created_at.clone(),
            pipeline.web_url.clone(),
        ])?;
    }
    finish_csv(writer)
}

pub fn jobs_csv(jobs: &[Job]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record(["Name", "Stage", "Status", "Duration", "Started", "URL"])?;
    for job in jobs {
        writer.write_record([
            job.name.clone(),
            job.stage.clone(),
            job.status.clone(),
            job.duration.map_or_else(String::new, |d| d.to_string()),
            job.started_at.clone().unwrap_or_default(),
            job.web_url.clone(),
        ])?;
    }
    finish_csv(writer)
}

pub fn schedules_csv(schedules: &[PipelineSchedule]) -> Result<String> {
    let mut writer = csv_writer();
    writer.write_record([
        "ID",
        "Description",
        "Ref",
        "Cron",
        "Timezone",
        "Next Run",
        "Active",
        "Owner",
        "Last Pipeline",
    ])?;
    for schedule in schedules {
        writer.write_record([
            schedule.id.to_string(),
            schedule.description.clone(),
            schedule.ref_.clone(),
            schedule.cron.clone(),
            schedule.cron_timezone.clone(),
            schedule.next_run_at.clone().unwrap_or_default(),
            yes_no(schedule.active),
            schedule.owner.username.clone(),
            schedule
                .last_pipeline
                .as_ref()
                .map_or_else(String::new, |p| p.status.clone()),
        ])?;
    }
    finish_csv(writer)
}

/// Markdown table for the group forest; nesting is shown with an indented
/// tree prefix in the first column.
pub fn groups_markdown(groups: &[Group], show_members: bool) -> String {
    let mut lines = if show_members {
        vec![
            "| Group | Username | Name | Role | User Status | Membership |".to_string(),
            "|-------|----------|------|------|-------------|------------|".to_string(),
        ]
    } else {
        vec![
            "| Group Path | Group ID |".to_string(),
            "|------------|----------|".to_string(),
        ]
    };

    for group in groups {
        add_markdown_rows(&mut lines, group, 0, show_members);
    }

    lines.join("\n")
}

fn add_markdown_rows(lines: &mut Vec<String>, group: &Group, depth: usize, show_members: bool) {
    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}└─ ", "  ".repeat(depth))
    };
    let label = format!("{prefix}{}", group.full_path);

    if show_members {
        if group.members.is_empty() {
            lines.push(format!("| {label} | *No members* | | | | |"));
        } else {
            for (i, member) in group.members.iter().enumerate() {
                let group_col = if i == 0 { label.as_str() } else { "" };
                lines.push(format!(
                    "| {group_col} | {} | {} | {} | {} | {} |",
                    member.username,
                    member.name,
                    member.access_level_description,
                    member.state,
                    member.membership_state
                ));
            }
        }
    } else {
        lines.push(format!("| {label} | {} |", group.id));
    }

    for subgroup in &group.subgroups {
        add_markdown_rows(lines, subgroup, depth + 1, show_members);
    }
}
