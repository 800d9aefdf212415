use crate::config::types::{Config, FrontierConfig, PolitenessConfig, SiteEntry, WorkerConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_frontier_config(&config.frontier)?;
    validate_politeness_config(&config.politeness)?;
    validate_worker_config(&config.workers)?;
    validate_sites(&config.sites, &config.frontier)?;
    Ok(())
}

/// Validates scheduling configuration
fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.max_sleep_ms < 1 || config.max_sleep_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "max_sleep_ms must be between 1 and 60000, got {}",
            config.max_sleep_ms
        )));
    }

    if config.balance_replenish_amount < 1 {
        return Err(ConfigError::Validation(format!(
            "balance_replenish_amount must be >= 1, got {}",
            config.balance_replenish_amount
        )));
    }

    if config.precedence_floor < 1 {
        return Err(ConfigError::Validation(format!(
            "precedence_floor must be >= 1, got {}",
            config.precedence_floor
        )));
    }

    if config.default_precedence >= config.precedence_floor {
        return Err(ConfigError::Validation(format!(
            "default_precedence ({}) must be below precedence_floor ({})",
            config.default_precedence, config.precedence_floor
        )));
    }

    if config.flush_batch_size < 1 {
        return Err(ConfigError::Validation(
            "flush_batch_size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates politeness configuration
fn validate_politeness_config(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if !config.delay_factor.is_finite() || config.delay_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay_factor must be a finite non-negative number, got {}",
            config.delay_factor
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates worker configuration
fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.count < 1 || config.count > 1024 {
        return Err(ConfigError::Validation(format!(
            "workers.count must be between 1 and 1024, got {}",
            config.count
        )));
    }

    Ok(())
}

/// Validates site entries and their seeds
fn validate_sites(sites: &[SiteEntry], frontier: &FrontierConfig) -> Result<(), ConfigError> {
    for entry in sites {
        validate_domain_string(&entry.domain)?;

        if let Some(precedence) = entry.precedence {
            if precedence >= frontier.precedence_floor {
                return Err(ConfigError::Validation(format!(
                    "Site '{}' precedence {} is at or beyond the precedence floor {}",
                    entry.domain, precedence, frontier.precedence_floor
                )));
            }
        }

        for seed in &entry.seeds {
            let url = Url::parse(seed).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' must use the http or https scheme",
                    seed
                )));
            }
        }
    }

    Ok(())
}

/// Validates a host name
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
