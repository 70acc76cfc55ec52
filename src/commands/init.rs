use anyhow::{Context, Result};
use std::path::Path;

use crate::config::EXAMPLE_CONFIG;

/// Write the commented example configuration to `output`
pub fn init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(output, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", output.display()))?;

    println!("✓ Example configuration written to: {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set pihole.address (and password) in the file");
    println!("  2. Check it:  family-dns-limiter --config {} check-config", output.display());
    println!("  3. Start:     family-dns-limiter --config {} start", output.display());

    Ok(())
}
