use anyhow::Result;
use clap::Subcommand;

use super::EXIT_OK;
use crate::api::GitLabClient;
use crate::models::Group;
use crate::output::{
    bright_red, bright_yellow, dim, fetch_spinner, finish_fetch, groups_csv, groups_markdown,
    groups_table, print_group_tree, resolve_format, to_json, OutputFormat,
};

#[derive(Subcommand)]
pub enum GroupsCommand {
    /// List all groups as a tree.
    List {
        /// Fetch group members (slower).
        #[arg(long)]
        include_members: bool,

        /// Only show members whose user account is active.
        #[arg(long)]
        active_members_only: bool,

        /// Search groups by name.
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of groups to fetch.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a group and its subgroups.
    Show {
        /// Group id, full path, or name.
        group: String,

        /// Fetch group members (slower).
        #[arg(long)]
        include_members: bool,

        /// Only show members whose user account is active.
        #[arg(long)]
        active_members_only: bool,
    },
}

pub async fn run(
    client: &GitLabClient,
    command: GroupsCommand,
    format: Option<OutputFormat>,
) -> Result<u8> {
    match command {
        GroupsCommand::List {
            include_members,
            active_members_only,
            search,
            limit,
        } => {
            let spinner = fetch_spinner("Fetching groups...");
            let flat = client
                .fetch_groups(true, search.as_deref(), limit)
                .await?;
            if flat.is_empty() {
                spinner.finish_and_clear();
                eprintln!("{}", bright_yellow("No groups found."));
                return Ok(EXIT_OK);
            }

            let tree = client
                .build_group_tree(flat, include_members, active_members_only)
                .await?;
            finish_fetch(&spinner, "Fetched groups");

            render_groups(&tree, include_members, format)?;
            eprintln!("\n{}", dim(format!("Total root groups: {}", tree.len())));
            Ok(EXIT_OK)
        }

        GroupsCommand::Show {
            group,
            include_members,
            active_members_only,
        } => {
            let Some(found) = client.fetch_group(&group).await? else {
                eprintln!("{}", bright_red(format!("Group '{group}' not found.")));
                return Ok(EXIT_OK);
            };

            let subgroups = client.fetch_subgroups(found.id).await?;
            let mut flat = vec![found];
            flat.extend(subgroups);

            let tree = client
                .build_group_tree(flat, include_members, active_members_only)
                .await?;
            render_groups(&tree, include_members, format)?;
            Ok(EXIT_OK)
        }
    }
}

fn render_groups(
    groups: &[Group],
    show_members: bool,
    format: Option<OutputFormat>,
) -> Result<()> {
    match resolve_format(format, OutputFormat::Tree, OutputFormat::Csv) {
        OutputFormat::Tree => print_group_tree(groups, show_members),
        OutputFormat::Table => println!("{}", groups_table(groups, show_members)),
        OutputFormat::Json => println!("{}", to_json(&groups)?),
        OutputFormat::Csv => print!("{}", groups_csv(groups, show_members)?),
        OutputFormat::Markdown => println!("{}", groups_markdown(groups, show_members)),
    }
    Ok(())
}
