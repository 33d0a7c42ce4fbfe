use log::warn;
use std::collections::{HashMap, HashSet};

use super::client::{encode_path, GitLabClient};
use crate::error::Result;
use crate::models::{Group, GroupMember};

/// Outcome of a group reference resolution. Ambiguity is kept distinct from
/// absence so it can be reported; the public lookup collapses both to "not
/// found".
#[derive(Debug)]
pub enum GroupLookup {
    Found(Box<Group>),
    NotFound,
    /// Full paths of every candidate that matched the reference.
    Ambiguous(Vec<String>),
}

impl GitLabClient {
    /// List groups visible to the token, flat and in upstream order.
    pub async fn fetch_groups(
        &self,
        include_subgroups: bool,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Group>> {
        let mut params: Vec<(String, String)> = Vec::new();
        if include_subgroups {
            params.push(("all_available".to_string(), "true".to_string()));
        }
        if let Some(search) = search {
            params.push(("search".to_string(), search.to_string()));
        }

        parse_groups(self.paginate("groups", &params, limit).await?)
    }

    /// List members of a group. `active_only` filters on the user account
    /// state; the membership state is reported but never filtered on.
    pub async fn fetch_group_members(
        &self,
        group_id: u64,
        active_only: bool,
    ) -> Result<Vec<GroupMember>> {
        let raw = self
            .paginate(&format!("groups/{group_id}/members"), &[], None)
            .await?;

        let mut members = Vec::new();
        for value in raw {
            let member: GroupMember = serde_json::from_value(value)?;
            let member = member.with_access_label();
            if active_only && member.state != "active" {
                continue;
            }
            members.push(member);
        }
        Ok(members)
    }

    pub async fn fetch_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        parse_groups(
            self.paginate(&format!("groups/{group_id}/subgroups"), &[], None)
                .await?,
        )
    }

    /// Resolve a group reference by trying, in order: numeric id lookup,
    /// encoded full-path lookup, then a search requiring an exact
    /// case-insensitive match on full path or path, then on name.
    pub async fn resolve_group(&self, reference: &str) -> Result<GroupLookup> {
        if !reference.is_empty() && reference.chars().all(|c| c.is_ascii_digit()) {
            if let Some(value) = self.get_optional(&format!("groups/{reference}"), &[]).await? {
                return Ok(GroupLookup::Found(Box::new(serde_json::from_value(value)?)));
            }
        }

        if let Some(value) = self
            .get_optional(&format!("groups/{}", encode_path(reference)), &[])
            .await?
        {
            return Ok(GroupLookup::Found(Box::new(serde_json::from_value(value)?)));
        }

        let candidates = self.fetch_groups(true, Some(reference), None).await?;

        let path_matches: Vec<&Group> = candidates
            .iter()
            .filter(|g| {
                g.full_path.eq_ignore_ascii_case(reference) || g.path.eq_ignore_ascii_case(reference)
            })
            .collect();
        match path_matches.as_slice() {
            [only] => return Ok(GroupLookup::Found(Box::new((*only).clone()))),
            [] => {}
            many => {
                return Ok(GroupLookup::Ambiguous(
                    many.iter().map(|g| g.full_path.clone()).collect(),
                ))
            }
        }

        let name_matches: Vec<&Group> = candidates
            .iter()
            .filter(|g| g.name.eq_ignore_ascii_case(reference))
            .collect();
        match name_matches.as_slice() {
            [only] => Ok(GroupLookup::Found(Box::new((*only).clone()))),
            [] => Ok(GroupLookup::NotFound),
            many => Ok(GroupLookup::Ambiguous(
                many.iter().map(|g| g.full_path.clone()).collect(),
            )),
        }
    }

    /// Public lookup: an ambiguous reference logs the candidates and
    /// resolves to `None`, exactly like a miss.
    pub async fn fetch_group(&self, reference: &str) -> Result<Option<Group>> {
        match self.resolve_group(reference).await? {
            GroupLookup::Found(group) => Ok(Some(*group)),
            GroupLookup::NotFound => Ok(None),
            GroupLookup::Ambiguous(candidates) => {
                warn!(
                    "Group reference '{reference}' is ambiguous: {}",
                    candidates.join(", ")
                );
                Ok(None)
            }
        }
    }

    /// Assemble the forest from a flat listing and optionally attach each
    /// group's members.
    pub async fn build_group_tree(
        &self,
        flat: Vec<Group>,
        fetch_members: bool,
        active_members_only: bool,
    ) -> Result<Vec<Group>> {
        let mut groups = flat;
        if fetch_members {
            for group in &mut groups {
                group.members = self
                    .fetch_group_members(group.id, active_members_only)
                    .await?;
            }
        }
        Ok(assemble_group_forest(groups))
    }
}

fn parse_groups(raw: Vec<serde_json::Value>) -> Result<Vec<Group>> {
    raw.into_iter()
        .map(|value| serde_json::from_value(value).map_err(Into::into))
        .collect()
}

/// Two-pass forest assembly: index every group by id, then attach each one
/// under its parent when the parent is present in the input. A group whose
/// parent was filtered out becomes a new root, it is never dropped.
pub fn assemble_group_forest(flat: Vec<Group>) -> Vec<Group> {
    let ids: HashSet<u64> = flat.iter().map(|g| g.id).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<u64, Vec<Group>> = HashMap::new();
    for group in flat {
        match group.parent_id {
            Some(parent) if ids.contains(&parent) => {
                children.entry(parent).or_default().push(group);
            }
            _ => roots.push(group),
        }
    }

    roots
        .into_iter()
        .map(|root| attach_subgroups(root, &mut children))
        .collect()
}

fn attach_subgroups(mut group: Group, children: &mut HashMap<u64, Vec<Group>>) -> Group {
    if let Some(kids) = children.remove(&group.id) {
        group.subgroups = kids
            .into_iter()
            .map(|kid| attach_subgroups(kid, children))
            .collect();
    }
    group
}
