//! `livecheck submit`: send ID details, ID document and selfie to the backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use livecheck_session::{
    Config, IdType, Selfie, SubmissionClient, Upload, VerificationSubmission,
};

#[derive(clap::Args)]
pub struct Args {
    /// national_id, passport, drivers_license or voters_card
    #[arg(long)]
    id_type: String,
    #[arg(long)]
    id_number: String,
    /// Image of the ID document
    #[arg(long)]
    id_document: PathBuf,
    /// Selfie captured by `livecheck check`
    #[arg(long, default_value = "selfie.jpg")]
    selfie: PathBuf,
    /// Backend base URL (default: $LIVECHECK_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,
    /// Extra attempts after a retryable failure
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let base_url = args
        .api_url
        .clone()
        .or_else(|| config.api_base_url.clone())
        .context("no backend URL: pass --api-url or set LIVECHECK_API_BASE_URL")?;

    let id_type: IdType = args.id_type.parse()?;
    let submission = VerificationSubmission {
        id_type,
        id_number: args.id_number.clone(),
        id_document: load_upload(&args.id_document)?,
        selfie: load_selfie(&args.selfie)?,
    };

    let client = SubmissionClient::new(&base_url, config.submit_timeout())?
        .with_token(config.api_token.clone());

    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.submit(&submission).await {
            Ok(receipt) => {
                println!(
                    "verification submitted ({}){}",
                    receipt.status,
                    receipt
                        .message
                        .map(|m| format!(": {m}"))
                        .unwrap_or_default()
                );
                return Ok(());
            }
            Err(e) if e.is_retryable() && attempt <= args.retries => {
                let backoff = Duration::from_secs(1 << attempt.min(5));
                tracing::warn!(attempt, error = %e, backoff_secs = backoff.as_secs(), "retrying submission");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(anyhow!(e).context("verification submission failed")),
        }
    }
}

fn load_upload(path: &Path) -> Result<Upload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let content_type = image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream")
        .to_string();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    Ok(Upload {
        file_name,
        content_type,
        bytes,
    })
}

fn load_selfie(path: &Path) -> Result<Selfie> {
    let jpeg =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("{} is not a readable image", path.display()))?;
    Ok(Selfie {
        jpeg,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_guesses_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("id-front.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
            .save(&png)
            .unwrap();
        let upload = load_upload(&png).unwrap();
        assert_eq!(upload.file_name, "id-front.png");
        assert_eq!(upload.content_type, "image/png");

        let other = dir.path().join("scan.dat");
        std::fs::write(&other, b"raw").unwrap();
        assert_eq!(load_upload(&other).unwrap().content_type, "application/octet-stream");
    }

    #[test]
    fn selfie_reads_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfie.jpg");
        image::RgbImage::from_pixel(8, 6, image::Rgb([90, 90, 90]))
            .save(&path)
            .unwrap();
        let selfie = load_selfie(&path).unwrap();
        assert_eq!((selfie.width, selfie.height), (8, 6));
        assert_eq!(&selfie.jpeg[..2], &[0xFF, 0xD8]);
    }
}
