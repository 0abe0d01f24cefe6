// src/main.rs
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use redirector::client::ManagementClient;
use redirector::config::{self, LogFormat, LoggingConfig, RedirectorConfig};
use redirector::{ForwardMode, Redirector};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let id_arg = Arg::new("id")
        .long("id")
        .value_name("ID")
        .help("URL id")
        .required(true)
        .value_parser(clap::value_parser!(i64));

    Command::new("redirector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Forwards every request to the currently selected URL")
        .arg(
            Arg::new("api")
                .long("api")
                .value_name("BASE_URL")
                .help("Management API of a running redirector (client subcommands)")
                .default_value("http://127.0.0.1:3000")
                .global(true),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the redirector (default)")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Configuration file path (falls back to CONFIG_FILE)"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Listen port (overrides PORT)")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("database-url")
                        .long("database-url")
                        .value_name("URL")
                        .help("SQLite database URL (overrides DATABASE_URL)"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_name("MODE")
                        .help("Forwarding mode: proxy or redirect")
                        .value_parser(["proxy", "redirect"]),
                ),
        )
        .subcommand(Command::new("urls").about("List stored URLs"))
        .subcommand(
            Command::new("add")
                .about("Store a new URL")
                .arg(Arg::new("url").long("url").value_name("URL").required(true))
                .arg(Arg::new("name").long("name").value_name("NAME").required(true)),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a URL")
                .arg(id_arg.clone()),
        )
        .subcommand(
            Command::new("select")
                .about("Make a URL the forwarding target")
                .arg(id_arg),
        )
        .subcommand(Command::new("selected").about("Show the forwarding target"))
}

fn init_logging(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match logging.format {
        LogFormat::Full => builder.init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// File (flag or `CONFIG_FILE`), then environment via `lookup`, then flags.
fn build_config<F>(matches: Option<&ArgMatches>, lookup: F) -> Result<RedirectorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_path = matches
        .and_then(|m| m.get_one::<String>("config").cloned())
        .or_else(|| lookup("CONFIG_FILE").filter(|p| !p.is_empty()));

    let mut config = match config_path {
        Some(path) => config::load_config(&path)?,
        None => RedirectorConfig::default(),
    };
    config.apply_overrides(lookup)?;

    if let Some(m) = matches {
        if let Some(port) = m.get_one::<u16>("port") {
            config.port = *port;
        }
        if let Some(url) = m.get_one::<String>("database-url") {
            config.database_url = url.clone();
        }
        if let Some(mode) = m.get_one::<String>("mode") {
            config.mode = mode.parse::<ForwardMode>()?;
        }
    }

    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let client = || {
        let api = matches
            .get_one::<String>("api")
            .map(String::as_str)
            .unwrap_or("http://127.0.0.1:3000");
        ManagementClient::new(api)
    };

    match matches.subcommand() {
        None => serve(None).await,
        Some(("serve", sub)) => serve(Some(sub)).await,
        Some(("urls", _)) => print_json(&client()?.list_urls().await?),
        Some(("add", sub)) => {
            let url = sub.get_one::<String>("url").context("--url is required")?;
            let name = sub.get_one::<String>("name").context("--name is required")?;
            print_json(&client()?.add_url(url, name).await?)
        }
        Some(("delete", sub)) => {
            let id = *sub.get_one::<i64>("id").context("--id is required")?;
            print_json(&client()?.delete_url(id).await?)
        }
        Some(("select", sub)) => {
            let id = *sub.get_one::<i64>("id").context("--id is required")?;
            print_json(&client()?.select_url(id).await?)
        }
        Some(("selected", _)) => print_json(&client()?.selected_url().await?),
        Some((other, _)) => Err(anyhow::anyhow!("unknown subcommand '{}'", other)),
    }
}

async fn serve(matches: Option<&ArgMatches>) -> Result<()> {
    let config = build_config(matches, |key| std::env::var(key).ok())?;
    init_logging(&config.logging);

    tracing::info!("🚀 Starting redirector on port {}", config.port);
    let redirector = Redirector::new(config);
    redirector.start().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_serve_flags_override_config() {
        let matches = cli()
            .try_get_matches_from([
                "redirector",
                "serve",
                "--port",
                "8081",
                "--mode",
                "redirect",
                "--database-url",
                "sqlite::memory:",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();

        let env = |key: &str| match key {
            "PORT" => Some("9999".to_string()),
            "REDIRECTOR_MODE" => Some("proxy".to_string()),
            _ => None,
        };
        let config = build_config(Some(sub), env).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.mode, ForwardMode::Redirect);
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_env_applies_without_flags() {
        let env = |key: &str| match key {
            "PORT" => Some("4000".to_string()),
            "DATABASE_URL" => Some("sqlite::memory:".to_string()),
            _ => None,
        };
        let config = build_config(None, env).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.mode, ForwardMode::Proxy);
    }

    #[test]
    fn test_select_requires_numeric_id() {
        assert!(cli()
            .try_get_matches_from(["redirector", "select", "--id", "abc"])
            .is_err());
        assert!(cli()
            .try_get_matches_from(["redirector", "select", "--id", "3"])
            .is_ok());
    }
}
