//! Config command - client configuration management.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use warren_config::ClientConfiguration;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved client configuration as TOML
    Show {
        /// Parse this connection string instead of reading the config file
        #[arg(long)]
        connection_string: Option<String>,
    },

    /// Check the configuration file (or a connection string) for errors
    Validate {
        /// Validate this connection string instead of the config file
        #[arg(long)]
        connection_string: Option<String>,
    },

    /// Show the configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show { connection_string } => cmd_show(ctx, connection_string.as_deref()),
        ConfigCommand::Validate { connection_string } => {
            cmd_validate(ctx, connection_string.as_deref())
        }
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn resolve(ctx: &Context, connection_string: Option<&str>) -> Result<ClientConfiguration> {
    match connection_string {
        Some(input) => Ok(ClientConfiguration::from_connection_string(input)?),
        None => ctx.load_client_configuration(),
    }
}

fn cmd_show(ctx: &Context, connection_string: Option<&str>) -> Result<()> {
    let config = resolve(ctx, connection_string)?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}

fn cmd_validate(ctx: &Context, connection_string: Option<&str>) -> Result<()> {
    let config = resolve(ctx, connection_string)?;
    if ctx.verbose {
        eprintln!(
            "{} host(s), port {}, virtual host {}",
            config.hostnames.len(),
            config.port,
            config.virtual_host
        );
    }
    println!("Configuration is valid");
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let Some(path) = &ctx.config_path else {
        bail!("No configuration directory available on this platform");
    };
    if ctx.json_output {
        let exists = path.exists();
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "exists": exists })
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}
