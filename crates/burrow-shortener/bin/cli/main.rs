mod cli;

use crate::cli::{Command, CLI};
use anyhow::{bail, Context};
use burrow_core::{Resolution, Storage};
use burrow_generator::RandomGenerator;
use burrow_shortener::ShortenerService;
use clap::Parser;
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_json);

    let settings = config.storage_settings();
    info!(
        base_url = %config.base_url,
        backend = %settings.backend(),
        "starting burrow"
    );

    let storage = burrow_storage::open(&settings)
        .await
        .context("failed to open storage")?;
    let service = ShortenerService::new(storage, RandomGenerator::new(), config.base_url.as_str());

    let result = run(&service, &config).await;
    // drains queued deletes before the process exits
    service.destroy().await;
    result
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run(
    service: &ShortenerService<dyn Storage, RandomGenerator>,
    config: &CLI,
) -> anyhow::Result<()> {
    let owner = config.owner()?;

    match &config.command {
        Command::Shorten { url } => {
            let code = service.shorten(url.as_str(), owner).await?;
            println!("{}", code.to_url(service.base_url()));
        }
        Command::Resolve { code } => {
            match service.resolve(code).await? {
                Resolution::Found(url) => println!("{url}"),
                Resolution::Gone => bail!("{code} has been deleted"),
                Resolution::Missing => bail!("{code} not found"),
            }
        }
        Command::Batch { input } => {
            let payload = match input {
                Some(path) => std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .context("failed to read stdin")?;
                    buf
                }
            };
            let response = service.batch_shorten(&payload, owner).await?;
            println!("{}", String::from_utf8_lossy(&response));
        }
        Command::List => {
            let owner = owner.context("listing links needs --user")?;
            match service.list_by_user(&owner).await? {
                Some(body) => println!("{}", String::from_utf8_lossy(&body)),
                None => println!("[]"),
            }
        }
        Command::Delete { codes } => {
            let owner = owner.context("deleting links needs --user")?;
            service
                .request_delete(serde_json::to_vec(codes)?, owner)
                .await;
            info!(codes = codes.len(), "delete requested");
        }
        Command::Ping => {
            if !service.ping().await {
                bail!("storage is unreachable");
            }
            println!("ok");
        }
    }

    Ok(())
}
