//! DweepLingo Fetch - one-shot download of the OPUS-MT bundles

use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod acquirer;
mod confirm;

use acquirer::{Acquirer, Summary, RULE};
use dweeplingo_core::{ComputeStrategy, HubSource, MarianLoader, ModelDownloader, Settings};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dweeplingo_fetch=info,dweeplingo_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load(None)?;

    // Smoke tests run on the same device the server would pick.
    let strategy = ComputeStrategy::resolve(settings.engine.device)?;
    let loader = Arc::new(MarianLoader::new(strategy, settings.engine.clone()));

    let downloader = ModelDownloader::new(HubSource::new()?, settings.engine.models_dir.clone());
    let mut acquirer = Acquirer::new(
        downloader,
        loader,
        confirm::from_mode(settings.fetch.confirm),
    );

    let Some(summary) = acquirer.run() else {
        return Ok(());
    };

    report(&summary, acquirer.models_dir(), &settings.server.bind_addr());
    if !summary.all_ready() {
        std::process::exit(1);
    }
    Ok(())
}

fn report(summary: &Summary, models_dir: &Path, bind_addr: &str) {
    println!("\n{}", RULE);
    println!("Download Summary");
    println!("{}", RULE);
    println!(
        "✓ Successfully downloaded: {}/{} models",
        summary.succeeded, summary.total
    );

    if summary.all_ready() {
        let location = std::fs::canonicalize(models_dir).unwrap_or_else(|_| models_dir.to_path_buf());
        println!("\nAll models ready to use!");
        println!("Models location: {}", location.display());
        println!("\n{}", RULE);
        println!("Next Steps:");
        println!("{}", RULE);
        println!("1. Start the translation server:");
        println!("   dweeplingo   (or: cargo run --release -p dweeplingo-server)");
        println!("\n2. Open the app:");
        println!("   http://{}/", bind_addr);
    } else {
        println!("\nSome models failed. Please check errors above.");
        println!("You can run dweeplingo-fetch again to retry.");
    }
    println!("{}", RULE);
}
