//! # MayMay
//!
//! Command-line meme composer.

use anyhow::Context;
use clap::Parser;
use maymay_cli::{compose, CliArgs, CliConfig, Command, TemplateClient, BASE_IMAGE_HINT};
use maymay_renderer::{Compositor, HttpFetcher};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::from(CliArgs::parse());

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "maymay_cli=info,maymay_renderer=info,maymay_core=info".into()),
    );
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if config.log_json {
        registry.with(fmt.json()).init();
    } else {
        registry.with(fmt).init();
    }

    tracing::debug!("Catalogue at {}", config.api_url);

    let client = TemplateClient::new(&config.api_url)
        .with_context(|| format!("bad catalogue URL {}", config.api_url))?;

    match config.command {
        Command::Templates { query } => {
            let templates = client.list_or_placeholder(&query).await;
            if templates.is_empty() {
                tracing::info!("No templates match \"{query}\"");
            }
            for template in templates {
                println!("{}\t{}\t{}", template.id, template.name, template.url);
            }
        }
        Command::Compose(args) => {
            let fetcher = HttpFetcher::new().context("could not build HTTP client")?;
            let compositor = Compositor::new(config.compositor);

            match compose::run(&args, &client, &fetcher, compositor, &config.out_dir).await {
                Ok(path) => println!("{}", path.display()),
                Err(e) if e.is_base_unavailable() => {
                    eprintln!("{BASE_IMAGE_HINT}");
                    return Err(anyhow::Error::new(e).context("export aborted"));
                }
                Err(e) => return Err(anyhow::Error::new(e).context("compose failed")),
            }
        }
    }

    Ok(())
}
