//! The `pathoscope diseases` command.

use std::path::PathBuf;

use clap::Args;
use pathoscope_core::{Catalogue, Config};
use serde::Serialize;

/// Arguments for the `diseases` command.
#[derive(Args, Debug)]
pub struct DiseasesArgs {
    /// Disease catalogue JSON (overrides `general.catalogue_path`)
    #[arg(long, env = "PATHOSCOPE_CATALOGUE")]
    pub catalogue: Option<PathBuf>,

    /// Print single-line JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

#[derive(Serialize)]
struct DiseaseList<'a> {
    diseases: &'a [String],
}

/// Execute the diseases command.
///
/// Only the catalogue is loaded; the model is not needed to list names.
/// An unreadable catalogue lists nothing, matching what `classify` sees.
pub fn execute(args: DiseasesArgs, config: &Config) -> anyhow::Result<()> {
    let path = args.catalogue.or_else(|| config.catalogue_path());

    let (catalogue, error) = Catalogue::load_configured(path.as_deref());
    if let Some(e) = error {
        tracing::warn!("{e}; listing no diseases");
    }

    println!("{}", render(&catalogue, args.compact)?);
    Ok(())
}

fn render(catalogue: &Catalogue, compact: bool) -> serde_json::Result<String> {
    let list = DiseaseList {
        diseases: catalogue.names(),
    };
    if compact {
        serde_json::to_string(&list)
    } else {
        serde_json::to_string_pretty(&list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_catalogue_order() {
        let catalogue = Catalogue::from_json_str(
            r#"{"Scabies": {"description": "burrows"}, "Impetigo": {"description": "honey crusts"}}"#,
        )
        .unwrap();
        assert_eq!(
            render(&catalogue, true).unwrap(),
            r#"{"diseases":["Scabies","Impetigo"]}"#
        );
    }

    #[test]
    fn test_render_empty_catalogue() {
        assert_eq!(
            render(&Catalogue::empty(), true).unwrap(),
            r#"{"diseases":[]}"#
        );
    }
}
