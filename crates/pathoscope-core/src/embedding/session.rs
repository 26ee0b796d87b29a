//! ONNX Runtime session construction shared by the CLIP encoders.

use std::path::Path;

use ort::session::Session;

use crate::config::Device;
use crate::error::ModelError;

/// Load an ONNX model onto the configured execution device.
pub(crate) fn load_session(model_path: &Path, device: Device) -> Result<Session, ModelError> {
    if !model_path.exists() {
        return Err(ModelError::NotFound {
            path: model_path.to_path_buf(),
        });
    }

    let builder = Session::builder().map_err(|e| ModelError::Load {
        path: model_path.to_path_buf(),
        message: format!("Failed to create ONNX session builder: {e}"),
    })?;

    with_device(builder, device, model_path)?
        .commit_from_file(model_path)
        .map_err(|e| ModelError::Load {
            path: model_path.to_path_buf(),
            message: format!("Failed to load ONNX model: {e}"),
        })
}

/// Register the CUDA execution provider when requested and compiled in.
///
/// ONNX Runtime falls back to CPU if the provider cannot be initialized.
#[cfg(feature = "cuda")]
fn with_device(
    builder: ort::session::builder::SessionBuilder,
    device: Device,
    model_path: &Path,
) -> Result<ort::session::builder::SessionBuilder, ModelError> {
    use ort::execution_providers::CUDAExecutionProvider;

    if device == Device::Cpu {
        tracing::debug!("Using CPU execution for {:?}", model_path);
        return Ok(builder);
    }

    tracing::debug!("Registering CUDA execution provider for {:?}", model_path);
    builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(|e| ModelError::Load {
            path: model_path.to_path_buf(),
            message: format!("Failed to register CUDA execution provider: {e}"),
        })
}

#[cfg(not(feature = "cuda"))]
fn with_device(
    builder: ort::session::builder::SessionBuilder,
    device: Device,
    model_path: &Path,
) -> Result<ort::session::builder::SessionBuilder, ModelError> {
    if device == Device::Cuda {
        tracing::warn!(
            "CUDA requested but pathoscope was built without the `cuda` feature; running {:?} on CPU",
            model_path
        );
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_not_found() {
        let err = load_session(Path::new("/nonexistent/vision_model.onnx"), Device::Cpu)
            .unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
        assert!(err.to_string().contains("models download"));
    }
}
