use std::path::Path;

/// Builds an ONNX Runtime session with the platform's preferred execution
/// provider and intra-op threads sized to the machine.
///
/// CoreML on macOS, DirectML on Windows, CPU elsewhere. Falls back to CPU if
/// the platform-specific provider is unavailable at runtime.
pub fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    log::debug!(
        "Loaded ONNX session {} ({intra_threads} intra-op threads)",
        model_path.display()
    );
    Ok(session)
}

fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Reads the square spatial input size (NCHW `H`) declared by a model,
/// or `None` when the dimension is dynamic.
pub fn declared_input_size(session: &ort::session::Session, input: usize) -> Option<u32> {
    session.inputs().get(input).and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 {
                Some(shape[2] as u32)
            } else {
                None
            }
        } else {
            None
        }
    })
}
