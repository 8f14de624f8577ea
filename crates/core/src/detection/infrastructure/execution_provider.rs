/// Return the preferred ONNX execution providers for the current platform.
///
/// ONNX Runtime falls back to CPU when the platform provider fails to
/// register, so an empty list simply means CPU inference.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        log::debug!("Requesting CoreML execution provider");
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        log::debug!("Requesting DirectML execution provider");
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_list_matches_platform() {
        let providers = preferred_execution_providers();
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            assert_eq!(providers.len(), 1);
        } else {
            assert!(providers.is_empty());
        }
    }
}
