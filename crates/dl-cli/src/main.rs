//! Delumen CLI
//!
//! Offline tooling around the engine: migrate and inspect settings
//! exports, resolve URLs against them, and check images for animation.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use dl_core::classify::{detect_animated, is_animated_gif, FetchError, ResourceFetcher};
use dl_core::migrate::parse_import;
use dl_core::store::SiteTable;

#[derive(Parser)]
#[command(name = "dl-cli")]
#[command(about = "Delumen settings and image tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a settings export (legacy v1 or current) to the current schema
    Migrate {
        /// Input settings JSON file
        #[arg(short, long)]
        input: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Resolve a URL against a settings export
    Resolve {
        /// Settings JSON file (current schema)
        #[arg(short, long)]
        settings: String,

        /// URL to resolve
        #[arg(short, long)]
        url: String,
    },

    /// List the site rules in a settings export
    Inspect {
        /// Settings JSON file (current schema)
        #[arg(short, long)]
        settings: String,
    },

    /// Check whether an image resource is animated
    GifCheck {
        /// Image file path or URL
        target: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate { input, output } => cmd_migrate(&input, output.as_deref()),
        Commands::Resolve { settings, url } => cmd_resolve(&settings, &url),
        Commands::Inspect { settings } => cmd_inspect(&settings),
        Commands::GifCheck { target } => cmd_gif_check(&target).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_table(path: &str) -> Result<SiteTable, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let payload =
        parse_import(&content).map_err(|e| format!("Invalid settings in '{}': {}", path, e))?;
    Ok(SiteTable::from_persisted(&payload))
}

fn cmd_migrate(input: &str, output: Option<&str>) -> Result<(), String> {
    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?;

    let payload = parse_import(&content)
        .map_err(|e| format!("Failed to migrate '{}': {}", input, e))?;

    let json = serde_json::to_string_pretty(&payload)
        .map_err(|e| format!("Failed to encode settings: {}", e))?;

    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            let site_count = payload.sites.as_ref().map_or(0, Vec::len);
            println!("Migrated {} site rules to '{}'", site_count, path);
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_resolve(settings: &str, url: &str) -> Result<(), String> {
    let table = load_table(settings)?;
    let message = table.resolved(url);
    let json = serde_json::to_string_pretty(&message)
        .map_err(|e| format!("Failed to encode message: {}", e))?;
    println!("{json}");
    Ok(())
}

fn cmd_inspect(settings: &str) -> Result<(), String> {
    let table = load_table(settings)?;
    let payload = table.to_persisted();

    println!("{:<40} {:<16} {}", "Website", "Filter", "Options");
    for row in payload.sites.unwrap_or_default() {
        let site = row.first().map(String::as_str).unwrap_or("");
        let site = if site.is_empty() { "DEFAULT" } else { site };
        let filter = row.get(1).map(String::as_str).unwrap_or("");
        let mods = row.iter().skip(2).cloned().collect::<Vec<_>>().join(", ");
        println!("{:<40} {:<16} {}", site, filter, mods);
    }
    println!();
    println!("Enabled: {}", table.enabled());
    for (key, value) in table.globals() {
        println!("{key}: {value}");
    }

    Ok(())
}

struct HttpFetcher {
    client: reqwest::Client,
}

impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

async fn cmd_gif_check(target: &str) -> Result<(), String> {
    let animated = if Path::new(target).exists() {
        let bytes =
            fs::read(target).map_err(|e| format!("Failed to read '{}': {}", target, e))?;
        is_animated_gif(&bytes)
    } else {
        let fetcher = HttpFetcher {
            client: reqwest::Client::new(),
        };
        detect_animated(target, &fetcher).await
    };

    println!("{}", if animated { "animated" } else { "static" });
    Ok(())
}
