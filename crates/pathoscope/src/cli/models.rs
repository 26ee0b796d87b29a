//! The `pathoscope models` command for managing the CLIP model files.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pathoscope_core::embedding::{text, vision, ClipModel};
use pathoscope_core::hash::content_hash;
use pathoscope_core::Config;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download the CLIP vision encoder, text encoder and tokenizer
    Download {
        /// Model to download (defaults to `model.model` from the config)
        #[arg(long)]
        model: Option<String>,
    },

    /// List known models and their install status
    List,

    /// Show the model directory path
    Path,
}

/// A CLIP export published as ONNX.
#[derive(Debug)]
struct ModelVariant {
    name: &'static str,
    label: &'static str,
    repo: &'static str,
}

const VARIANTS: &[ModelVariant] = &[
    ModelVariant {
        name: "clip-vit-base-patch32",
        label: "ViT-B/32",
        repo: "Xenova/clip-vit-base-patch32",
    },
    ModelVariant {
        name: "clip-vit-base-patch16",
        label: "ViT-B/16",
        repo: "Xenova/clip-vit-base-patch16",
    },
];

/// One file fetched per model: remote path within the repo, local name.
struct ModelFile {
    remote_path: &'static str,
    local_name: &'static str,
    label: &'static str,
}

const MODEL_FILES: &[ModelFile] = &[
    ModelFile {
        remote_path: "onnx/vision_model.onnx",
        local_name: vision::VISION_MODEL_FILENAME,
        label: "vision encoder",
    },
    ModelFile {
        remote_path: "onnx/text_model.onnx",
        local_name: text::TEXT_MODEL_FILENAME,
        label: "text encoder",
    },
    ModelFile {
        remote_path: "tokenizer.json",
        local_name: text::TOKENIZER_FILENAME,
        label: "tokenizer",
    },
];

// TODO: pin BLAKE3 digests of the Xenova CLIP exports so downloads are verified.
/// Expected digest for a given model file, when one is pinned.
fn expected_blake3(_model: &str, _local_name: &str) -> Option<&'static str> {
    None
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { model } => {
            let name = model.as_deref().unwrap_or(&config.model.model);
            let variant = find_variant(name)?;
            let dest_dir = config.model_dir().join(variant.name);

            let client = reqwest::Client::new();
            download_variant(&client, variant, &dest_dir).await?;
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            let model_dir = config.model_dir();
            println!("Models in {}:\n", model_dir.display());

            for variant in VARIANTS {
                let dir = model_dir.join(variant.name);
                let status = if ClipModel::files_exist(&dir) {
                    "ready"
                } else {
                    "not installed"
                };
                let default_marker = if variant.name == config.model.model {
                    "  (configured)"
                } else {
                    ""
                };
                println!(
                    "  - {:26} {:10} {:14}{}",
                    variant.name, variant.label, status, default_marker
                );
            }

            if !ClipModel::files_exist(&config.model_path()) {
                println!("\nRun `pathoscope models download` to fetch the configured model.");
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_path().display());
        }
    }

    Ok(())
}

fn find_variant(name: &str) -> anyhow::Result<&'static ModelVariant> {
    VARIANTS.iter().find(|v| v.name == name).ok_or_else(|| {
        let known: Vec<&str> = VARIANTS.iter().map(|v| v.name).collect();
        anyhow::anyhow!("Unknown model {name:?}. Known models: {}", known.join(", "))
    })
}

/// Download every file of `variant` into `dest_dir`, skipping files already present.
async fn download_variant(
    client: &reqwest::Client,
    variant: &ModelVariant,
    dest_dir: &Path,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dest_dir)?;

    for file in MODEL_FILES {
        let dest = dest_dir.join(file.local_name);
        if dest.exists() {
            tracing::info!("{} {} already exists at {:?}", variant.label, file.label, dest);
            continue;
        }

        let url = format!(
            "https://huggingface.co/{}/resolve/main/{}",
            variant.repo, file.remote_path
        );
        tracing::info!("Downloading {} {}...", variant.label, file.label);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);

        download_file(
            client,
            &url,
            &dest,
            expected_blake3(variant.name, file.local_name),
        )
        .await?;

        let file_size = std::fs::metadata(&dest)?.len();
        tracing::info!(
            "  {} complete ({:.1} MB)",
            file.label,
            file_size as f64 / (1024.0 * 1024.0)
        );
    }

    Ok(())
}

/// Download a file from a URL to a local path, streaming to disk.
///
/// The body is written to a `.part` file and renamed once complete, so an
/// interrupted download is never mistaken for an installed model. If
/// `expected_blake3` is provided the file is verified; otherwise its digest
/// is logged.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    expected_blake3: Option<&str>,
) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let progress = create_progress_bar(response.content_length());
    let partial = partial_path(dest);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);
    progress.finish_and_clear();

    match expected_blake3 {
        Some(expected) => verify_blake3(&partial, expected)?,
        None => {
            let digest = content_hash(&partial)?;
            tracing::info!("  BLAKE3: {digest}");
        }
    }

    tokio::fs::rename(&partial, dest).await?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Byte progress bar, or a spinner when the server sends no length.
fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    }
}

/// Verify a downloaded file's BLAKE3 checksum.
///
/// On mismatch, removes the corrupt file so the next run re-downloads.
fn verify_blake3(path: &Path, expected: &str) -> anyhow::Result<()> {
    let actual = content_hash(path)
        .map_err(|e| anyhow::anyhow!("Checksum computation failed for {}: {e}", path.display()))?;

    if actual != expected {
        let _ = std::fs::remove_file(path);
        anyhow::bail!(
            "Checksum mismatch for {}:\n  expected: {}\n  actual:   {}\n\
             Corrupt file removed, try downloading again.",
            path.display(),
            expected,
            actual
        );
    }

    tracing::debug!("  Checksum verified: {}…", &actual[..16]);
    Ok(())
}
