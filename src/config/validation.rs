use crate::config::types::{
    Config, DetectorConfig, FetchSettings, GovernorConfig, OutputConfig, RetryConfig,
    RunnerConfig, SelectorConfig, SourceConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Outcome stage names accepted in `fetch.middleware`
pub const KNOWN_STAGES: &[&str] = &["challenge-warning", "transient-status"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_runner_config(&config.runner)?;
    validate_retry_config(&config.retry)?;
    validate_governor_config(&config.governor)?;
    validate_detector_config(&config.detector)?;
    validate_fetch_settings(&config.fetch)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

fn validate_runner_config(config: &RunnerConfig) -> Result<(), ConfigError> {
    if config.parallelism < 1 || config.parallelism > 64 {
        return Err(ConfigError::Validation(format!(
            "parallelism must be between 1 and 64, got {}",
            config.parallelism
        )));
    }
    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_backoff_ms < config.base_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "max-backoff-ms ({}) must be >= base-backoff-ms ({})",
            config.max_backoff_ms, config.base_backoff_ms
        )));
    }
    Ok(())
}

fn validate_governor_config(config: &GovernorConfig) -> Result<(), ConfigError> {
    if config.success_threshold < 1 {
        return Err(ConfigError::Validation(
            "success-threshold must be >= 1".to_string(),
        ));
    }

    if !config.backoff_factor.is_finite() || config.backoff_factor <= 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff-factor must be a finite number > 1.0, got {}",
            config.backoff_factor
        )));
    }

    Ok(())
}

fn validate_detector_config(config: &DetectorConfig) -> Result<(), ConfigError> {
    if config
        .challenge_signatures
        .iter()
        .any(|s| s.trim().is_empty())
    {
        return Err(ConfigError::Validation(
            "challenge-signatures cannot contain empty entries".to_string(),
        ));
    }
    Ok(())
}

fn validate_fetch_settings(config: &FetchSettings) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::Validation(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    for stage in &config.middleware {
        if !KNOWN_STAGES.contains(&stage.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown middleware stage '{}' (known: {})",
                stage,
                KNOWN_STAGES.join(", ")
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[source]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Source name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source name '{}'",
                source.name
            )));
        }

        validate_url_template(&source.url_template)?;

        if source.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "Source '{}': max-pages must be >= 1",
                source.name
            )));
        }

        if source.max_attempts < 1 {
            return Err(ConfigError::Validation(format!(
                "Source '{}': max-attempts must be >= 1",
                source.name
            )));
        }

        if source.delay_ceiling_ms < source.delay_floor_ms {
            return Err(ConfigError::Validation(format!(
                "Source '{}': delay-ceiling-ms ({}) must be >= delay-floor-ms ({})",
                source.name, source.delay_ceiling_ms, source.delay_floor_ms
            )));
        }

        validate_selectors(&source.name, &source.selectors)?;
    }

    Ok(())
}

/// A template must carry `{page}` and yield an HTTP(S) URL once filled in
fn validate_url_template(template: &str) -> Result<(), ConfigError> {
    if !template.contains("{page}") {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' has no {{page}} placeholder",
            template
        )));
    }

    let sample = template.replace("{term}", "sample").replace("{page}", "1");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidTemplate(format!("'{}': {}", template, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidTemplate(format!(
            "'{}' must use http or https",
            template
        )));
    }

    Ok(())
}

fn validate_selectors(source: &str, selectors: &SelectorConfig) -> Result<(), ConfigError> {
    let fields = [
        ("container", Some(&selectors.container)),
        ("name", Some(&selectors.name)),
        ("price", Some(&selectors.price)),
        ("link", Some(&selectors.link)),
        ("image", selectors.image.as_ref()),
        ("availability", selectors.availability.as_ref()),
    ];

    for (field, list) in fields {
        let Some(list) = list else {
            continue;
        };
        if list.is_empty() {
            return Err(ConfigError::InvalidSelector(format!(
                "Source '{}', {} selector list is empty",
                source, field
            )));
        }
        for selector in list.iter() {
            ::scraper::Selector::parse(selector).map_err(|e| {
                ConfigError::InvalidSelector(format!(
                    "Source '{}', {} selector '{}': {:?}",
                    source, field, selector, e
                ))
            })?;
        }
    }

    Ok(())
}
