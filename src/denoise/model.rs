//! Model-backed denoising with classical fallback

use super::{
    classical::{classical_chain, ClassicalDenoiser},
    kernels::{convolve_3x3, gaussian_blur, map_samples, SHARPEN_KERNEL},
    Denoiser,
};
use crate::{
    backends::{BackendFactory, DefaultBackendFactory},
    config::{DenoiseConfig, DenoisingStrategy, GaussianParams},
    error::{DenoiseError, Result},
    inference::InferenceBackend,
    models::{ModelManager, ModelSource},
    utils::{ColorParts, ImagePreprocessor},
};
use image::DynamicImage;
use std::sync::Mutex;
use tracing::{span, Level};

/// A backend that initialized successfully
struct LoadedModel {
    backend: Mutex<Box<dyn InferenceBackend>>,
    input_size: u32,
    name: String,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.name)
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum ModelState {
    /// Classical chain followed by sharpening and a light Gaussian pass
    Simulated,
    /// Real inference through a backend
    Loaded(LoadedModel),
    /// No usable model; runs the plain classical chain
    Unavailable,
}

/// Denoiser that prefers a learned model
///
/// The model is resolved once at construction. Any inference error at call
/// time falls back to the classical chain for that call.
#[derive(Debug)]
pub struct ModelDenoiser {
    classical: ClassicalDenoiser,
    smoothing: GaussianParams,
    state: ModelState,
}

impl ModelDenoiser {
    /// Resolve the model with the backends compiled into this build
    #[must_use]
    pub fn from_config(config: &DenoiseConfig) -> Self {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Resolve the model described by `config.model_spec` through `factory`
    #[must_use]
    pub fn with_factory(config: &DenoiseConfig, factory: &dyn BackendFactory) -> Self {
        let state = match config.model_spec.as_ref().map(|spec| &spec.source) {
            None => {
                log::warn!("Model-backed denoising requested without a model, using classical chain");
                ModelState::Unavailable
            },
            Some(ModelSource::Simulated) => ModelState::Simulated,
            Some(ModelSource::External(path)) => match Self::load(config, factory) {
                Ok(model) => {
                    log::info!("Loaded denoising model '{}'", model.name);
                    ModelState::Loaded(model)
                },
                Err(e) => {
                    log::warn!(
                        "Failed to load denoising model from {}: {e}; using classical chain",
                        path.display()
                    );
                    ModelState::Unavailable
                },
            },
        };

        Self {
            classical: ClassicalDenoiser::from_config(config),
            smoothing: config.sharpen_smoothing,
            state,
        }
    }

    /// Wrap an already constructed backend
    ///
    /// # Errors
    /// - Backend initialization fails
    pub fn with_backend(config: &DenoiseConfig, mut backend: Box<dyn InferenceBackend>) -> Result<Self> {
        backend.initialize(config)?;
        let (_, _, side, _) = backend.input_shape();
        let name = backend.get_model_info()?.name;

        Ok(Self {
            classical: ClassicalDenoiser::from_config(config),
            smoothing: config.sharpen_smoothing,
            state: ModelState::Loaded(LoadedModel {
                backend: Mutex::new(backend),
                input_size: side as u32,
                name,
            }),
        })
    }

    fn load(config: &DenoiseConfig, factory: &dyn BackendFactory) -> Result<LoadedModel> {
        let spec = config
            .model_spec
            .as_ref()
            .ok_or_else(|| DenoiseError::model("No model specified"))?;
        let manager = ModelManager::from_spec(spec)?;
        let input_size = manager.input_size();
        let name = manager.descriptor().name.clone();

        let mut backend = factory.create_backend(config.backend_type, manager)?;
        if let Some(duration) = backend.initialize(config)? {
            log::debug!("Model '{name}' initialized in {}ms", duration.as_millis());
        }

        Ok(LoadedModel {
            backend: Mutex::new(backend),
            input_size,
            name,
        })
    }

    /// Whether a real model backend is in use
    #[must_use]
    pub fn has_model(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    fn simulate(&self, image: &DynamicImage) -> DynamicImage {
        let nlm = self.classical.non_local_means();
        let bilateral = self.classical.bilateral();
        let smoothing = self.smoothing;

        map_samples(image, |src, width, height, channels| {
            let denoised = classical_chain(src, width, height, channels, nlm, bilateral);
            let sharpened = convolve_3x3(&denoised, width, height, channels, &SHARPEN_KERNEL);
            gaussian_blur(
                &sharpened,
                width,
                height,
                channels,
                smoothing.kernel_size,
                smoothing.sigma,
            )
        })
    }

    fn run_model(model: &LoadedModel, image: &DynamicImage) -> Result<DynamicImage> {
        let (width, height) = (image.width(), image.height());
        let parts = ColorParts::split(image);
        let grayscale = matches!(parts.base, DynamicImage::ImageLuma8(_));

        let tensor = ImagePreprocessor::image_to_tensor(&parts.base.to_rgb8(), model.input_size)?;
        let output = {
            let mut backend = model
                .backend
                .lock()
                .map_err(|_| DenoiseError::internal("Model backend lock poisoned"))?;
            backend.infer(&tensor)?
        };
        let restored = ImagePreprocessor::tensor_to_image(&output, width, height)?;

        let processed = if grayscale {
            DynamicImage::ImageLuma8(DynamicImage::ImageRgb8(restored).to_luma8())
        } else {
            DynamicImage::ImageRgb8(restored)
        };
        Ok(parts.merge(processed))
    }
}

impl Denoiser for ModelDenoiser {
    fn denoise(&self, image: &DynamicImage) -> DynamicImage {
        if image.width() == 0 || image.height() == 0 {
            return image.clone();
        }

        match &self.state {
            ModelState::Simulated => {
                let _span = span!(Level::DEBUG, "simulated_model_denoise").entered();
                self.simulate(image)
            },
            ModelState::Loaded(model) => {
                let _span = span!(Level::DEBUG, "model_inference", model = %model.name).entered();
                match Self::run_model(model, image) {
                    Ok(denoised) => denoised,
                    Err(e) => {
                        log::warn!("Model inference failed: {e}; falling back to classical chain");
                        self.classical.denoise(image)
                    },
                }
            },
            ModelState::Unavailable => self.classical.denoise(image),
        }
    }

    fn strategy(&self) -> DenoisingStrategy {
        match self.state {
            ModelState::Unavailable => DenoisingStrategy::Classical,
            ModelState::Simulated | ModelState::Loaded(_) => DenoisingStrategy::ModelBacked,
        }
    }

    fn model_name(&self) -> Option<String> {
        match &self.state {
            ModelState::Simulated => Some("simulated".to_string()),
            ModelState::Loaded(model) => Some(model.name.clone()),
            ModelState::Unavailable => None,
        }
    }
}
