//! # shapegen
//!
//! Generates the Rust server types of an API from a service description:
//! request/response/error body types, the constructors converting between
//! bodies and domain values, and request body validators.
//!
//! ## Architecture
//!
//! ```text
//! Description (JSON)
//!        │
//!        ▼
//! ┌──────────────┐
//! │      IR      │  Attribute schema model (serde)
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Validate   │  References, wire names, views, cycles
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Codegen    │  Shapes → validators → converters → render,
//! │ (per service)│  one name registry per service
//! └──────┬───────┘
//!        │
//!        ▼
//!   <service>/server_types.rs
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shapegen::{Generator, GeneratorConfig};
//!
//! let config = GeneratorConfig {
//!     description: "design.json".into(),
//!     out_dir: "src/gen".into(),
//!     ..GeneratorConfig::default()
//! };
//!
//! let result = Generator::new(config).generate()?;
//! println!("{} files written", result.files.len());
//! # Ok::<(), shapegen::GenError>(())
//! ```

pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod interp;
pub mod ir;
pub mod validate;

use std::path::PathBuf;

use tracing::info;

pub use codegen::ServiceArtifacts;
pub use config::GeneratorConfig;
pub use diagnostic::GenError;
pub use ir::Description;

/// Runs the generation pipeline.
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Creates a new generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Loads, checks and generates the configured description, then writes
    /// one file per service.
    ///
    /// Nothing is written unless every service generated successfully.
    pub fn generate(&self) -> Result<GenerateResult, GenError> {
        let desc = self.load()?;
        let artifacts = self.generate_from(&desc)?;
        let files = self.write_output(&codegen::GeneratedCode::from(artifacts.as_slice()))?;

        Ok(GenerateResult {
            services: artifacts.len(),
            types: artifacts.iter().map(|a| a.shapes.len()).sum(),
            validators: artifacts.iter().map(|a| a.validators.len()).sum(),
            files,
        })
    }

    /// Loads and checks the configured description, running generation in
    /// memory without writing any file.
    pub fn check(&self) -> Result<Description, GenError> {
        let desc = self.load()?;
        self.generate_from(&desc)?;
        Ok(desc)
    }

    /// Checks and generates an in-memory description. Writes nothing.
    pub fn generate_from(&self, desc: &Description) -> Result<Vec<ServiceArtifacts>, GenError> {
        validate::validate_description(desc)?;
        codegen::generate(desc, &self.config)
    }

    fn load(&self) -> Result<Description, GenError> {
        let path = &self.config.description;
        let source = std::fs::read_to_string(path).map_err(|e| GenError::io(path, e.to_string()))?;
        Description::from_json(&source)
    }

    /// Writes generated code to the output directory.
    fn write_output(&self, generated: &codegen::GeneratedCode) -> Result<Vec<PathBuf>, GenError> {
        let mut written = Vec::with_capacity(generated.files.len());

        for (filename, content) in &generated.files {
            let path = self.config.out_dir.join(filename);
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| GenError::io(parent, e.to_string()))?;
            }
            std::fs::write(&path, content).map_err(|e| GenError::io(&path, e.to_string()))?;
            info!(path = %path.display(), "wrote server types");
            written.push(path);
        }

        Ok(written)
    }
}

/// Result of a successful generation.
#[derive(Debug)]
pub struct GenerateResult {
    /// Number of services generated.
    pub services: usize,
    /// Number of body types across all services.
    pub types: usize,
    /// Number of request body validators across all services.
    pub validators: usize,
    /// Paths of the written files.
    pub files: Vec<PathBuf>,
}
