//! Generator configuration.

use std::path::PathBuf;

/// Configuration for the server types generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// JSON service description to generate from.
    pub description: PathBuf,

    /// Directory to write generated Rust code.
    pub out_dir: PathBuf,

    /// Module under which each service's domain module lives.
    ///
    /// The domain types of service `store` are looked up in
    /// `{domain_module}::store`.
    pub domain_module: String,

    /// Module, relative to a service's domain module, holding view types.
    pub views_module: String,

    /// Crate the generated code imports its runtime support from.
    pub runtime_crate: String,

    /// Generate services on parallel threads.
    pub parallel: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            description: PathBuf::from("design.json"),
            out_dir: PathBuf::from("src/gen"),
            domain_module: "crate".to_string(),
            views_module: "views".to_string(),
            runtime_crate: "shapegen_runtime".to_string(),
            parallel: false,
        }
    }
}
