//! The `pathoscope classify` command.

use std::path::{Path, PathBuf};

use clap::Args;
use pathoscope_core::{ClassificationResponse, Config, Intake, Pathoscope};

/// Arguments for the `classify` command.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Image to classify (PNG, JPG, JPEG, BMP or TIFF)
    pub image: PathBuf,

    /// Disease catalogue JSON (overrides `general.catalogue_path`)
    #[arg(long, env = "PATHOSCOPE_CATALOGUE")]
    pub catalogue: Option<PathBuf>,

    /// Number of predictions to return
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub top_k: Option<u16>,

    /// Print single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Delete the image once classification finishes, whatever the outcome
    #[arg(long)]
    pub remove: bool,
}

/// Execute the classify command.
///
/// The JSON response always goes to stdout. The exit status is non-zero for
/// every failure except an empty catalogue, which is reported in the payload.
pub async fn execute(args: ClassifyArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(catalogue) = &args.catalogue {
        config.general.catalogue_path = Some(catalogue.clone());
    }
    if let Some(top_k) = args.top_k {
        config.classifier.top_k = usize::from(top_k);
    }

    let outcome = classify(&args.image, &config).await;

    if args.remove {
        remove_upload(&args.image);
    }

    match outcome {
        Ok(Outcome { response, catalogue_loaded }) => {
            print_response(&response, args.compact)?;
            match response.error {
                Some(message) if catalogue_loaded => {
                    anyhow::bail!("Classification failed: {message}")
                }
                _ => Ok(()),
            }
        }
        Err(e) => {
            let response = ClassificationResponse {
                error: Some(e.to_string()),
                predictions: vec![],
            };
            print_response(&response, args.compact)?;
            Err(e)
        }
    }
}

/// A classification payload plus whether any diseases were available.
#[derive(Debug)]
struct Outcome {
    response: ClassificationResponse,
    catalogue_loaded: bool,
}

async fn classify(image: &Path, config: &Config) -> anyhow::Result<Outcome> {
    Intake::new(&config.upload, &config.limits).validate(image)?;

    let service = Pathoscope::new(config)?;
    tracing::info!(
        "Classifying {:?} against {} diseases",
        image,
        service.disease_names().len()
    );

    Ok(Outcome {
        response: service.classify_response(image).await,
        catalogue_loaded: !service.catalogue().is_empty(),
    })
}

fn print_response(response: &ClassificationResponse, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(response)?
    } else {
        serde_json::to_string_pretty(response)?
    };
    println!("{json}");
    Ok(())
}

fn remove_upload(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {:?}", path),
        Err(e) => tracing::warn!("Failed to remove {:?}: {e}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.png");
        std::fs::write(&path, b"x").unwrap();

        remove_upload(&path);
        assert!(!path.exists());
        // A second removal only warns.
        remove_upload(&path);
    }

    #[tokio::test]
    async fn test_rejected_upload_fails_before_model_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let err = classify(&path, &Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid file type"));
    }
}
