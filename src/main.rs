// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{ArchCommands, CacheCommands, Cli, Commands, RepoCommands};
use debtrack::Config;
use debtrack::tasks::RunParameters;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&config),

        Commands::Repo(repo_cmd) => match repo_cmd {
            RepoCommands::Add {
                name,
                shorthand,
                uri,
                suite,
                components,
                codename,
                public_uri,
                default,
                position,
                no_binary,
                architectures,
            } => commands::cmd_repo_add(
                &config,
                &name,
                &shorthand,
                &uri,
                &suite,
                components,
                commands::RepoOptions {
                    codename,
                    public_uri,
                    is_default: default,
                    position,
                    binary: !no_binary,
                    architectures,
                },
            ),
            RepoCommands::List => commands::cmd_repo_list(&config),
            RepoCommands::Remove { name } => commands::cmd_repo_remove(&config, &name),
        },

        Commands::Arch(ArchCommands::Add {
            repository,
            architecture,
        }) => commands::cmd_arch_add(&config, &repository, &architecture),

        Commands::Run {
            task,
            force_update,
            fake_update,
        } => commands::cmd_run(
            &config,
            &task,
            RunParameters {
                force_update,
                fake_update,
            },
        ),

        Commands::RunAll { force_update } => commands::cmd_run_all(
            &config,
            RunParameters {
                force_update,
                fake_update: false,
            },
        ),

        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Update { force } => commands::cmd_cache_update(&config, force),
            CacheCommands::Retrieve {
                name,
                version,
                debian_only,
            } => commands::cmd_cache_retrieve(&config, &name, &version, debian_only),
            CacheCommands::Clear { sources_only } => commands::cmd_cache_clear(&config, sources_only),
            CacheCommands::Size => commands::cmd_cache_size(&config),
        },
    }
}
