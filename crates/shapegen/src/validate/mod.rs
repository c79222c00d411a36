//! Generation-time validation of a service description.
//!
//! Everything checked here would otherwise surface as a broken or
//! non-terminating generation, so it runs before any code is produced.

mod cycles;
mod structure;

use tracing::debug;

use crate::diagnostic::GenError;
use crate::ir::Description;

pub use cycles::find_required_cycle;

/// Validates the entire description.
pub fn validate_description(desc: &Description) -> Result<(), GenError> {
    // Validate structure
    structure::validate_structure(desc)?;

    // Reject values that would be infinitely large
    if let Some(chain) = find_required_cycle(desc) {
        return Err(GenError::RequiredCycle {
            chain: chain.join(" -> "),
        });
    }

    debug!(services = desc.services.len(), types = desc.types.len(), "description is valid");
    Ok(())
}
