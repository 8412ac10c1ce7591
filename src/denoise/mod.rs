//! Denoising strategies
//!
//! A [`Denoiser`] is resolved once from a [`DenoiseConfig`] and then shared by
//! every call of the pipeline. Denoising itself never fails: the model-backed
//! strategy degrades to the classical chain whenever its model is missing or
//! errors out.

mod bilateral;
mod classical;
pub(crate) mod kernels;
mod model;
mod nlmeans;

pub use classical::ClassicalDenoiser;
pub use kernels::SHARPEN_KERNEL;
pub use model::ModelDenoiser;

use crate::{
    backends::BackendFactory,
    config::{DenoiseConfig, DenoisingStrategy},
};
use image::DynamicImage;
use std::sync::Arc;

/// Image denoising capability
///
/// Implementations keep the dimensions and pixel format of their input.
pub trait Denoiser: Send + Sync + std::fmt::Debug {
    /// Produce a denoised copy of `image`
    fn denoise(&self, image: &DynamicImage) -> DynamicImage;

    /// Strategy this denoiser actually runs
    fn strategy(&self) -> DenoisingStrategy;

    /// Name of the loaded model, if any
    fn model_name(&self) -> Option<String> {
        None
    }
}

/// Resolve the denoiser described by `config`
#[must_use]
pub fn create_denoiser(config: &DenoiseConfig, factory: &dyn BackendFactory) -> Arc<dyn Denoiser> {
    match config.strategy {
        DenoisingStrategy::Classical => Arc::new(ClassicalDenoiser::from_config(config)),
        DenoisingStrategy::ModelBacked => Arc::new(ModelDenoiser::with_factory(config, factory)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::test_utils::{MockBackendBehavior, MockBackendFactory},
        models::ModelSpec,
    };

    #[test]
    fn test_create_classical() {
        let factory = MockBackendFactory::new(MockBackendBehavior::Identity);
        let denoiser = create_denoiser(&DenoiseConfig::default(), &factory);
        assert_eq!(denoiser.strategy(), DenoisingStrategy::Classical);
        assert!(factory.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn test_create_model_backed_simulation() {
        let config = DenoiseConfig::builder()
            .strategy(DenoisingStrategy::ModelBacked)
            .model_spec(ModelSpec::simulated())
            .build()
            .unwrap();
        let factory = MockBackendFactory::new(MockBackendBehavior::Identity);
        let denoiser = create_denoiser(&config, &factory);
        assert_eq!(denoiser.strategy(), DenoisingStrategy::ModelBacked);
        assert_eq!(denoiser.model_name().as_deref(), Some("simulated"));
    }

    #[test]
    fn test_model_backed_without_model_resolves_to_classical() {
        let config = DenoiseConfig::builder()
            .strategy(DenoisingStrategy::ModelBacked)
            .build()
            .unwrap();
        let factory = MockBackendFactory::new(MockBackendBehavior::Identity);
        let denoiser = create_denoiser(&config, &factory);
        assert_eq!(denoiser.strategy(), DenoisingStrategy::Classical);
    }
}
