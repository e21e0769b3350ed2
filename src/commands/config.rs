//! Handler for the `config` subcommand.

use crate::config::DiffConfig;

/// Prints the default configuration as YAML, suitable as a starting point
/// for a `--config` file.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn run() -> Result<(), String> {
    let yaml = serde_yaml::to_string(&DiffConfig::default())
        .map_err(|e| format!("Failed to serialize default config: {e}"))?;
    print!("{yaml}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&DiffConfig::default()).expect("serialize");
        let parsed: DiffConfig = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(parsed, DiffConfig::default());
        assert!(run().is_ok());
    }
}
