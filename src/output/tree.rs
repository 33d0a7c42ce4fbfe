use crate::models::Group;

use super::styling::{bright_green, bright_red, bright_yellow, cyan, dim};

/// Render the group forest with nesting, members inline when requested.
pub fn print_group_tree(groups: &[Group], show_members: bool) {
    for group in groups {
        print_group_node(group, 0, show_members);
    }
}

fn print_group_node(group: &Group, depth: usize, show_members: bool) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{} {}",
        cyan(&group.name),
        dim(format!("({})", group.full_path))
    );

    if show_members {
        for member in &group.members {
            let state_marker = if member.state == "active" {
                bright_green("●")
            } else {
                bright_red("●")
            };
            println!(
                "{indent}  {state_marker} {} - {} {}",
                bright_yellow(&member.username),
                member.name,
                dim(format!("({})", member.access_level_description))
            );
        }
    }

    for subgroup in &group.subgroups {
        print_group_node(subgroup, depth + 1, show_members);
    }
}
