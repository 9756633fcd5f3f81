//! `livecheck setup`: fetch the landmark model assets listed in the manifest.

use anyhow::{bail, Context, Result};
use livecheck_models::{load_manifest, sha256_file_hex, ModelFile};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Download a single model file with progress output.
fn download_model(model: &ModelFile, url: &str, dest: &Path) -> Result<()> {
    let tmp_path = dest.with_extension("part");

    println!("  downloading {}...", model.name);

    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = resp.into_body().into_reader();
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut buf = [0u8; 65536];
    let mut total: u64 = 0;
    let mut last_pct: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;

        if let Some(len) = content_length.filter(|len| *len > 0) {
            let pct = (total * 100) / len;
            if pct / 10 > last_pct / 10 {
                print!("  {pct}%\r");
                io::stdout().flush().ok();
                last_pct = pct;
            }
        }
    }

    file.flush()?;
    drop(file);

    print!("  verifying checksum... ");
    io::stdout().flush().ok();
    let digest = sha256_file_hex(&tmp_path)?;
    if !digest.eq_ignore_ascii_case(model.sha256.trim()) {
        fs::remove_file(&tmp_path).ok();
        bail!(
            "checksum mismatch for {}:\n  expected: {}\n  got:      {}",
            model.name,
            model.sha256,
            digest
        );
    }
    println!("ok");

    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    Ok(())
}

/// Download every manifest entry that is missing or fails its checksum.
pub fn run(model_dir: &Path) -> Result<()> {
    println!("Model directory: {}", model_dir.display());

    let manifest = load_manifest(model_dir)
        .context("place a manifest.toml listing the landmark model files in the model directory")?;

    let mut downloaded = 0;
    let mut skipped = 0;

    for model in &manifest.models {
        let dest = model_dir.join(&model.name);
        if model.is_present(&dest) {
            println!("  {} already present (checksum ok)", model.name);
            skipped += 1;
            continue;
        }

        let Some(url) = model.url.as_deref() else {
            bail!(
                "{} is missing or corrupt and the manifest gives no url for it",
                model.name
            );
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        download_model(model, url, &dest)?;
        downloaded += 1;
    }

    println!();
    if downloaded > 0 {
        println!("Setup complete: {downloaded} model(s) downloaded, {skipped} already present.");
    } else {
        println!("All models already present. Nothing to download.");
    }

    Ok(())
}
