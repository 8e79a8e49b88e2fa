//! Download, store and smoke-test each direction's bundle

use dweeplingo_core::model::bundle::{bundle_size, is_populated};
use dweeplingo_core::{
    BundleManifest, BundleSource, Direction, DownloadEvent, ModelDownloader, ModelLoader, Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::confirm::{Confirm, Prompt};

pub const RULE: &str = "============================================================";

/// Outcome of a full acquisition run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub total: usize,
}

impl Summary {
    pub fn all_ready(&self) -> bool {
        self.succeeded == self.total
    }
}

pub struct Acquirer<S, C> {
    downloader: ModelDownloader<S>,
    loader: Arc<dyn ModelLoader>,
    confirm: C,
}

impl<S: BundleSource, C: Confirm> Acquirer<S, C> {
    pub fn new(downloader: ModelDownloader<S>, loader: Arc<dyn ModelLoader>, confirm: C) -> Self {
        Self {
            downloader,
            loader,
            confirm,
        }
    }

    pub fn models_dir(&self) -> &Path {
        self.downloader.models_dir()
    }

    /// Print the plan, ask once, then process every direction.
    /// Returns `None` when the user declines.
    pub fn run(&mut self) -> Option<Summary> {
        println!("{}", RULE);
        println!("Helsinki-NLP OPUS-MT Model Downloader");
        println!("{}", RULE);
        println!("\nThis will download:");
        for direction in Direction::all() {
            println!(
                "  - {} -> {} ({})",
                direction.source().name(),
                direction.target().name(),
                direction.repo_id()
            );
        }
        println!("\n{}", RULE);

        if !self.confirm.confirm(Prompt::Proceed) {
            println!("Download cancelled");
            return None;
        }

        let mut succeeded = 0;
        for direction in Direction::all().iter().copied() {
            println!("\n{}", RULE);
            println!("Processing: {}", direction);
            println!("{}", RULE);

            if self.process(direction) {
                succeeded += 1;
            }
        }

        Some(Summary {
            succeeded,
            total: Direction::all().len(),
        })
    }

    /// Make one direction ready. Failures are reported and never escape.
    fn process(&mut self, direction: Direction) -> bool {
        let path = self.downloader.model_path(direction);

        if is_populated(&path) {
            println!("Model already exists at: {}", path.display());
            if !self.confirm.confirm(Prompt::Redownload(direction)) {
                println!("   Skipping download");
                return match self.verify(direction) {
                    Ok(()) => {
                        println!("   ✓ {} verified!", direction);
                        true
                    }
                    Err(e) => {
                        println!("   ✗ Test failed: {}", e);
                        false
                    }
                };
            }

            if let Err(e) = std::fs::remove_dir_all(&path) {
                error!("Failed to remove {:?}: {}", path, e);
                println!("   ✗ {} could not be replaced", direction);
                return false;
            }
            println!("   Removed old files");
        }

        if let Err(e) = self.acquire(direction) {
            error!("{} download failed: {}", direction, e);
            println!("   ✗ {} download failed: {}", direction, e);
            return false;
        }

        match self.verify(direction) {
            Ok(()) => {
                println!("   ✓ {} complete!", direction);
                true
            }
            Err(e) => {
                println!("   ✗ Test failed: {}", e);
                println!("   ! {} downloaded but test failed", direction);
                false
            }
        }
    }

    /// Fetch the bundle into its final location and report its size.
    pub fn acquire(&self, direction: Direction) -> Result<u64> {
        let card = direction.card();
        println!("\nDownloading {}", direction.repo_id());
        println!("Save location: {}", self.downloader.model_path(direction).display());
        println!("\nModel Information:");
        println!(
            "   Direction:      {} -> {}",
            direction.source().name(),
            direction.target().name()
        );
        println!("   Dataset:        {}", card.dataset);
        println!("   Architecture:   {}", card.architecture);
        println!("   Preprocessing:  {}", card.preprocessing);
        println!();

        let mut spinner: Option<ProgressBar> = None;
        let result = self.downloader.download(direction, &mut |event| match event {
            DownloadEvent::Started { file, index, total } => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(spinner_style());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message(format!("[{}/{}] {}", index, total, file));
                spinner = Some(pb);
            }
            DownloadEvent::Finished { file, size_bytes } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!("✓ {} ({})", file, format_mb(size_bytes)));
                }
            }
        });
        if let Some(pb) = spinner.take() {
            pb.abandon_with_message("✗ failed");
        }

        let path = result?;
        let size = bundle_size(&path)?;
        println!("   Model size: {}", format_mb(size));
        Ok(size)
    }

    /// Check the manifest when one exists, then load the bundle offline and
    /// translate the direction's smoke sentences.
    pub fn verify(&self, direction: Direction) -> Result<()> {
        let path = self.downloader.model_path(direction);
        println!("\n   Testing model...");

        match BundleManifest::read(&path)? {
            Some(manifest) => {
                manifest.verify(&path)?;
                println!(
                    "   Manifest OK ({} files, {})",
                    manifest.files.len(),
                    format_mb(manifest.total_bytes())
                );
            }
            None => warn!("{:?} has no manifest, skipping checksum verification", path),
        }

        let model = self.loader.load(direction, &path)?;
        let sentences = direction.smoke_sentences();
        println!("   Testing with {} sentences:", sentences.len());

        for (i, sentence) in sentences.iter().enumerate() {
            let translation = model.translate(sentence)?;
            println!("   [{}] {}", i + 1, sentence);
            println!("       -> {}", translation);
        }

        println!("   ✓ All tests passed!");
        Ok(())
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("   {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
