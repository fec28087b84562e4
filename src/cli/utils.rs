use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success<T: Serialize>(
    output_format: &OutputFormat,
    message: &str,
    data: Option<&T>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data) = data {
                response["data"] = serde_json::to_value(data)?;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print `label: value` lines in text mode, skipping empty values.
pub fn output_fields(fields: &[(&str, Option<String>)]) {
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {:<14} {}", format!("{}:", label), value);
        }
    }
}

