use crate::models::{MergeRequest, Pipeline, PipelineSchedule, Project};

use super::styling::{bright, cyan, dim};

pub fn print_project_details(project: &Project) {
    println!("{}", cyan(&project.name));
    println!("{}", dim(&project.path_with_namespace));
    println!();
    println!(
        "{} {}",
        bright("Description:"),
        project.description.as_deref().unwrap_or("N/A")
    );
    println!("{} {}", bright("Visibility:"), project.visibility);
    println!(
        "{} {}",
        bright("Default Branch:"),
        project.default_branch.as_deref().unwrap_or("N/A")
    );
    println!("{} {}", bright("Stars:"), project.star_count);
    println!("{} {}", bright("Forks:"), project.forks_count);
    println!("{} {}", bright("URL:"), project.web_url);
}

pub fn print_merge_request_details(mr: &MergeRequest) {
    println!("{}", cyan(format!("!{} - {}", mr.iid, mr.title)));
    println!();
    println!("{} {}", bright("State:"), mr.state);
    println!("{} {}", bright("Author:"), mr.author);
    println!("{} {}", bright("Source Branch:"), mr.source_branch);
    println!("{} {}", bright("Target Branch:"), mr.target_branch);
    println!("{} {}", bright("Draft:"), mr.is_draft());
    println!("{} {}", bright("Created:"), mr.created_at);
    println!("{} {}", bright("Updated:"), mr.updated_at);
    println!(
        "{} {}",
        bright("Merged:"),
        mr.merged_at.as_deref().unwrap_or("N/A")
    );
    println!("{} {}", bright("URL:"), mr.web_url);
    println!();
    println!("{}", bright("Description:"));
    println!("{}", mr.description.as_deref().unwrap_or("No description"));
}

pub fn print_pipeline_details(pipeline: &Pipeline) {
    println!("{}", cyan(format!("Pipeline #{}", pipeline.id)));
    println!("{} {}", bright("Status:"), pipeline.status);
    println!("{} {}", bright("Ref:"), pipeline.ref_);
    println!("{} {}", bright("SHA:"), pipeline.sha);
    match pipeline.duration {
        Some(secs) => println!("{} {secs}s", bright("Duration:")),
        None => println!("{} N/A", bright("Duration:")),
    }
    println!("{} {}", bright("URL:"), pipeline.web_url);
}

pub fn print_schedule_details(schedule: &PipelineSchedule) {
    println!(
        "{}",
        cyan(format!("Schedule #{} - {}", schedule.id, schedule.description))
    );
    println!();
    println!("{} {}", bright("Ref:"), schedule.ref_);
    println!(
        "{} {} ({})",
        bright("Cron:"),
        schedule.cron,
        schedule.cron_timezone
    );
    println!(
        "{} {}",
        bright("Next Run:"),
        schedule.next_run_at.as_deref().unwrap_or("N/A")
    );
    println!(
        "{} {}",
        bright("Active:"),
        if schedule.active { "Yes" } else { "No" }
    );
    println!(
        "{} {} ({})",
        bright("Owner:"),
        schedule.owner.name,
        schedule.owner.username
    );

    if let Some(last) = &schedule.last_pipeline {
        println!(
            "{} #{} {} ({})",
            bright("Last Pipeline:"),
            last.id,
            last.status,
            last.ref_
        );
    }

    if !schedule.variables.is_empty() {
        println!();
        println!("{}", bright("Variables:"));
        for variable in &schedule.variables {
            let raw_marker = if variable.raw { " [raw]" } else { "" };
            println!(
                "  {} = {} {}{raw_marker}",
                variable.key,
                variable.value,
                dim(format!("({})", variable.variable_type))
            );
        }
    }
}
