use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging based on verbosity level
pub fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("recipe_candidate_finder=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("recipe_candidate_finder=info,warn,error"))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if verbose {
        tracing::info!("Verbose logging enabled");
    }

    Ok(())
}

/// Log a recipe picked up by the scanner
pub fn log_recipe_scanned(recipe: &str, name: &str, url: &str) {
    tracing::debug!(recipe = recipe, name = name, url = url, "Recipe scanned");
}

/// Log a recipe that could not be processed; the caller carries on
pub fn log_recipe_error(recipe: &str, error: &str) {
    tracing::warn!(recipe = recipe, error = error, "Recipe raised an error");
}

/// Log the result of an external build
pub fn log_build_result(package: &str, exit_code: Option<i32>, duration_ms: u64) {
    match exit_code {
        Some(0) => tracing::info!(
            package = package,
            duration_ms = duration_ms,
            "Sanity build succeeded"
        ),
        Some(code) => tracing::warn!(
            package = package,
            exit_code = code,
            duration_ms = duration_ms,
            "Sanity build failed"
        ),
        None => tracing::warn!(
            package = package,
            duration_ms = duration_ms,
            "Sanity build terminated without exit code"
        ),
    }
}

/// Log source downloads
pub fn log_download(url: &str, cached: bool, bytes: Option<u64>) {
    if cached {
        tracing::debug!(url = url, "Using cached source archive");
    } else if let Some(size) = bytes {
        tracing::info!(url = url, bytes = size, "Source archive downloaded");
    } else {
        tracing::debug!(url = url, "Source download initiated");
    }
}

/// Log system information for debugging
pub fn log_system_info() {
    tracing::debug!(
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "System information"
    );
}

/// Log performance metrics
pub fn log_performance(operation: &str, duration_ms: u64) {
    tracing::debug!(
        operation = operation,
        duration_ms = duration_ms,
        "Operation performance"
    );
}
