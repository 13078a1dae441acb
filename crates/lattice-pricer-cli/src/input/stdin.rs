use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Parse piped pricing input into `T`, or `None` when stdin is a terminal.
///
/// JSON is tried first; anything else is read as YAML, matching `--input`.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped<T: DeserializeOwned>(text: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parsed = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(json_err) => serde_yaml::from_str(trimmed).map_err(|yaml_err| {
            format!("stdin is neither JSON ({json_err}) nor YAML ({yaml_err})")
        })?,
    };
    tracing::debug!(bytes = trimmed.len(), "read pricing input from stdin");
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_pricer_core::binomial::model::PricingConfig;

    #[test]
    fn test_blank_input_is_none() {
        let parsed: Option<PricingConfig> = parse_piped("  \n").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_json_and_yaml_give_same_config() {
        let json: PricingConfig = parse_piped(
            r#"{"spot_price":100,"volatility":0.2,"risk_free_rate":0.05,
                "time_to_expiry":1,"strike_price":95,"steps":50}"#,
        )
        .unwrap()
        .unwrap();
        let yaml: PricingConfig = parse_piped(
            "spot_price: 100\nvolatility: 0.2\nrisk_free_rate: 0.05\n\
             time_to_expiry: 1\nstrike_price: 95\nsteps: 50\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(json, yaml);
        assert_eq!(json.steps, 50);
    }

    #[test]
    fn test_missing_field_is_error() {
        let result: Result<Option<PricingConfig>, _> = parse_piped(r#"{"spot_price":100}"#);
        assert!(result.is_err());
    }
}
