use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variables consulted for the instance URL, in priority order.
const URL_ENV_VARS: &[&str] = &["GITLAB_URL", "CI_SERVER_URL"];

/// Environment variables consulted for the access token, in priority order.
const TOKEN_ENV_VARS: &[&str] = &[
    "GITLAB_TOKEN",
    "GL_TOKEN",
    "CI_JOB_TOKEN",
    "CI_API_TOKEN",
    "GITLAB_ACCESS_TOKEN",
];

const DEFAULT_BASE_URL: &str = "https://gitlab.com";

/// Process-wide configuration, resolved once at startup and passed by
/// reference into every component. Never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    /// GitLab instance base URL, without a trailing slash.
    pub base_url: String,

    /// Personal access token, if one was found.
    pub token: Option<String>,

    /// Default project path for project-scoped commands.
    pub project: Option<String>,

    /// Verbose request/response tracing.
    pub debug: bool,
}

impl Settings {
    /// Resolve configuration from CLI flags, environment variables, and the
    /// glab config file, in that priority order.
    pub fn resolve(
        url: Option<String>,
        token: Option<String>,
        project: Option<String>,
        debug: bool,
    ) -> Self {
        Self::resolve_from(url, token, project, debug, &glab_config_candidates())
    }

    fn resolve_from(
        url: Option<String>,
        token: Option<String>,
        project: Option<String>,
        debug: bool,
        config_candidates: &[PathBuf],
    ) -> Self {
        let mut base_url = url.or_else(|| env_first(URL_ENV_VARS));
        let mut token = token.or_else(|| env_first(TOKEN_ENV_VARS));

        // Only consult the glab config when the environment left a gap.
        if base_url.is_none() || token.is_none() {
            if let Some((config_url, config_token)) = read_glab_config(config_candidates) {
                if base_url.is_none() {
                    base_url = Some(config_url);
                }
                if token.is_none() {
                    token = config_token;
                }
            }
        }

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            base_url,
            token,
            project,
            debug,
        }
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn glab_config_candidates() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    vec![
        home.join(".config").join("glab-cli").join("config.yml"),
        home.join(".glab-cli").join("config.yml"),
    ]
}

#[derive(Debug, Deserialize)]
struct GlabConfig {
    /// Default host name, used when no host carries a token.
    host: Option<String>,

    #[serde(default)]
    hosts: IndexMap<String, GlabHost>,
}

#[derive(Debug, Deserialize)]
struct GlabHost {
    token: Option<String>,
    api_protocol: Option<String>,
    api_host: Option<String>,
}

impl GlabHost {
    fn base_url(&self, host_name: &str) -> String {
        let protocol = self.api_protocol.as_deref().unwrap_or("https");
        let host = self.api_host.as_deref().unwrap_or(host_name);
        format!("{protocol}://{host}")
    }
}

/// Read `(base_url, token)` from the first parseable glab config file.
///
/// Any host with a non-empty token wins over the configured default host;
/// the default host is used tokenless when nothing better exists.
fn read_glab_config(candidates: &[PathBuf]) -> Option<(String, Option<String>)> {
    candidates
        .iter()
        .filter(|path| path.exists())
        .find_map(|path| match parse_glab_config(path) {
            Ok(found) => found,
            Err(e) => {
                debug!("Skipping glab config {}: {e}", path.display());
                None
            }
        })
}

fn parse_glab_config(path: &Path) -> anyhow::Result<Option<(String, Option<String>)>> {
    let contents = std::fs::read_to_string(path)?;
    let config: GlabConfig = serde_yaml::from_str(&contents)?;

    for (host_name, host) in &config.hosts {
        if let Some(token) = &host.token {
            if !token.trim().is_empty() {
                return Ok(Some((host.base_url(host_name), Some(token.clone()))));
            }
        }
    }

    let default_host = config.host.as_deref().unwrap_or("gitlab.com");
    if let Some(host) = config.hosts.get(default_host) {
        return Ok(Some((host.base_url(default_host), None)));
    }

    Ok(None)
}
