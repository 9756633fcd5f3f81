//! `livecheck models`: verify landmark model assets against the manifest.

use std::path::Path;

use anyhow::{Context, Result};

pub fn run(model_dir: &Path) -> Result<()> {
    println!("Model directory: {}", model_dir.display());

    let manifest = livecheck_models::verify_models_dir(model_dir)
        .context("landmark models unavailable; run `livecheck setup`")?;

    for model in &manifest.models {
        println!("  {} ok", model.name);
    }
    println!("{} model file(s) verified.", manifest.models.len());
    Ok(())
}
