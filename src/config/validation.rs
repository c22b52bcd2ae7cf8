use crate::config::types::{
    CacheConfig, EngineConfig, FetcherConfig, JobConfig, LimitsConfig, UserAgentConfig,
};
use crate::url::normalize_url;
use crate::{AuditError, ConfigError};
use url::Url;

/// Longest keyword accepted for relevance scoring
const MAX_KEYWORD_CHARS: usize = 100;

/// Validates the entire engine configuration
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_cache_config(&config.cache)?;
    validate_limits_config(&config.limits)?;

    if let Some(rate_limit) = &config.rate_limit {
        if rate_limit.max_submissions == 0 || rate_limit.window_secs == 0 {
            return Err(ConfigError::Validation(
                "rate-limit max-submissions and window-secs must both be >= 1".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 || config.connect_timeout_secs > config.timeout_secs {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be between 1 and timeout-secs ({}), got {}",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.max_age_hours < 0 || config.cleanup_days < 0 {
        return Err(ConfigError::Validation(
            "max-age-hours and cleanup-days cannot be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.whole_site_ceiling == 0 {
        return Err(ConfigError::Validation(
            "whole-site-ceiling must be >= 1".to_string(),
        ));
    }

    if config.max_pages_limit == 0 || config.max_pages_limit > config.whole_site_ceiling {
        return Err(ConfigError::Validation(format!(
            "max-pages-limit must be between 1 and whole-site-ceiling ({}), got {}",
            config.whole_site_ceiling, config.max_pages_limit
        )));
    }

    if config.default_max_pages == 0 || config.default_max_pages > config.max_pages_limit {
        return Err(ConfigError::Validation(format!(
            "default-max-pages must be between 1 and max-pages-limit ({}), got {}",
            config.max_pages_limit, config.default_max_pages
        )));
    }

    if config.max_concurrency == 0 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.default_concurrency == 0 || config.default_concurrency > config.max_concurrency {
        return Err(ConfigError::Validation(format!(
            "default-concurrency must be between 1 and max-concurrency ({}), got {}",
            config.max_concurrency, config.default_concurrency
        )));
    }

    Ok(())
}

/// A job request that passed submit-time validation
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// Normalized root URL
    pub target: Url,

    /// Trimmed keyword; `None` when absent or blank
    pub keyword: Option<String>,

    pub config: JobConfig,
}

/// Validates a job request against the engine limits
///
/// Malformed targets and keywords are rejected here so that a job record is
/// never created for them.
pub fn validate_job_request(
    target: &str,
    keyword: Option<&str>,
    config: &JobConfig,
    limits: &LimitsConfig,
) -> Result<ValidatedRequest, AuditError> {
    let target = normalize_url(target)
        .map_err(|e| AuditError::Validation(format!("Invalid target URL '{}': {}", target, e)))?;

    let keyword = match keyword.map(str::trim) {
        None | Some("") => None,
        Some(k) if k.chars().count() > MAX_KEYWORD_CHARS => {
            return Err(AuditError::Validation(format!(
                "Keyword must be at most {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        Some(k) if k.chars().any(char::is_control) => {
            return Err(AuditError::Validation(
                "Keyword cannot contain control characters".to_string(),
            ));
        }
        Some(k) => Some(k.to_string()),
    };

    if !config.whole_site && (config.max_pages == 0 || config.max_pages > limits.max_pages_limit) {
        return Err(AuditError::Validation(format!(
            "max_pages must be between 1 and {}, got {}",
            limits.max_pages_limit, config.max_pages
        )));
    }

    if config.concurrency == 0 || config.concurrency > limits.max_concurrency {
        return Err(AuditError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            limits.max_concurrency, config.concurrency
        )));
    }

    Ok(ValidatedRequest {
        target,
        keyword,
        config: config.clone(),
    })
}
