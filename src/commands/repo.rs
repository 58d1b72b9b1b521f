// src/commands/repo.rs
//! Repository and architecture management commands

use super::open_db;
use anyhow::{Result, anyhow};
use debtrack::Config;
use debtrack::db::models::Repository;
use tracing::info;

/// Optional settings of a new repository
#[derive(Debug, Default)]
pub struct RepoOptions {
    pub codename: Option<String>,
    pub public_uri: Option<String>,
    pub is_default: bool,
    pub position: i32,
    pub binary: bool,
    pub architectures: Vec<String>,
}

/// Add a new repository
pub fn cmd_repo_add(
    config: &Config,
    name: &str,
    shorthand: &str,
    uri: &str,
    suite: &str,
    components: Vec<String>,
    options: RepoOptions,
) -> Result<()> {
    info!("Adding repository: {} ({} {})", name, uri, suite);
    let conn = open_db(config)?;

    let mut repo = Repository::new(
        name.to_string(),
        shorthand.to_string(),
        uri.to_string(),
        suite.to_string(),
        components,
    );
    repo.codename = options.codename;
    repo.public_uri = options.public_uri;
    repo.is_default = options.is_default;
    repo.position = options.position;
    repo.binary = options.binary;
    repo.insert(&conn)?;

    for arch in &options.architectures {
        repo.add_architecture(&conn, arch)?;
    }

    println!("Added repository: {}", repo.name);
    println!("  Shorthand: {}", repo.shorthand);
    println!("  URI: {} {}", repo.uri, repo.suite);
    println!("  Components: {}", repo.components.join(" "));
    println!("  Default: {}", repo.is_default);
    println!("  Position: {}", repo.position);
    if !options.architectures.is_empty() {
        println!("  Architectures: {}", options.architectures.join(", "));
    }
    Ok(())
}

/// List repositories
pub fn cmd_repo_list(config: &Config) -> Result<()> {
    let conn = open_db(config)?;
    let repos = Repository::list_all(&conn)?;

    if repos.is_empty() {
        println!("No repositories configured");
        return Ok(());
    }

    println!("Repositories:");
    for repo in repos {
        let default_mark = if repo.is_default { "*" } else { " " };
        let archs = repo.architectures(&conn)?;
        println!(
            "  {} {} [{}] (position: {})",
            default_mark, repo.name, repo.shorthand, repo.position
        );
        println!(
            "      {} {} {}",
            repo.uri,
            repo.suite,
            repo.components.join(" ")
        );
        if !archs.is_empty() {
            println!("      architectures: {}", archs.join(", "));
        }
    }
    Ok(())
}

/// Remove a repository
pub fn cmd_repo_remove(config: &Config, name: &str) -> Result<()> {
    info!("Removing repository: {}", name);
    let conn = open_db(config)?;
    let repo = Repository::find_by_name(&conn, name)?
        .ok_or_else(|| anyhow!("Repository '{}' not found", name))?;
    let id = repo
        .id
        .ok_or_else(|| anyhow!("Repository '{}' has no id", name))?;
    Repository::delete(&conn, id)?;
    println!("Removed repository: {}", name);
    Ok(())
}

/// Attach an architecture to a repository
pub fn cmd_arch_add(config: &Config, repository: &str, architecture: &str) -> Result<()> {
    let conn = open_db(config)?;
    let repo = Repository::find_by_name(&conn, repository)?
        .ok_or_else(|| anyhow!("Repository '{}' not found", repository))?;
    repo.add_architecture(&conn, architecture)?;
    println!("Added architecture {} to {}", architecture, repo.name);
    Ok(())
}
