use crate::audit::logger::AuditLogger;
use crate::bridge::bridge::CompatibilityBridge;
use crate::cli::config::{AppConfig, load_document, load_values};
use crate::fill::fill_model::FillOptions;
use crate::report::console::{format_fill_report, format_scan_report, format_validation_report};

fn build_bridge(document: &str, config: &AppConfig) -> Result<CompatibilityBridge, Box<dyn std::error::Error>> {
    let doc = load_document(document)?;
    let audit = match &config.audit.path {
        Some(path) => AuditLogger::new(path),
        None => AuditLogger::disabled(),
    };
    Ok(CompatibilityBridge::with_audit(
        doc.into_shared(),
        config.scan.clone(),
        None,
        config.fallback.clone(),
        audit,
    ))
}

// ============================================================================
// scan subcommand
// ============================================================================

pub fn cmd_scan(
    document: &str,
    format: &str,
    config: &AppConfig,
    verbose: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    let bridge = build_bridge(document, config)?;
    if verbose > 0 {
        eprintln!("Scanning {} with the {:?} engine...", document, bridge.active_kind());
    }
    let snapshot = bridge.refresh()?;

    let output = match format {
        "json" => serde_json::to_string_pretty(snapshot.as_ref())? + "\n",
        _ => format_scan_report(&snapshot),
    };
    print!("{}", output);
    Ok(())
}

// ============================================================================
// fill subcommand
// ============================================================================

/// Apply a values file and return whether every entry succeeded.
pub async fn cmd_fill(
    document: &str,
    values: &str,
    smart: bool,
    validate: bool,
    format: &str,
    config: &AppConfig,
) -> Result<bool, Box<dyn std::error::Error>> {
    let bridge = build_bridge(document, config)?;
    let values = load_values(values)?;
    let options = FillOptions {
        smart_matching: smart || config.fill.smart_matching,
        validate: validate || config.fill.validate,
        ..config.fill.clone()
    };

    let result = bridge.apply_values(&values, &options).await?;
    let output = match format {
        "json" => serde_json::to_string_pretty(&result)? + "\n",
        _ => format_fill_report(&result),
    };
    print!("{}", output);
    Ok(result.all_succeeded())
}

// ============================================================================
// validate subcommand
// ============================================================================

/// Validate every form and return whether all are valid.
pub async fn cmd_validate(
    document: &str,
    format: &str,
    config: &AppConfig,
) -> Result<bool, Box<dyn std::error::Error>> {
    let bridge = build_bridge(document, config)?;
    let results = bridge.validate_forms(&config.validation).await?;
    let output = match format {
        "json" => serde_json::to_string_pretty(&results)? + "\n",
        _ => format_validation_report(&results),
    };
    print!("{}", output);
    Ok(results.iter().all(|r| r.valid))
}
