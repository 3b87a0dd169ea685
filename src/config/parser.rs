use crate::config::types::CrawlerOptions;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses an options file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML options file
///
/// # Returns
///
/// * `Ok(CrawlerOptions)` - Successfully loaded and validated options
/// * `Err(ConfigError)` - Failed to load, parse, or validate the options
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ripple_crawl::config::load_options;
///
/// let options = load_options(Path::new("crawl.toml")).unwrap();
/// println!("Max depth: {}", options.max_depth);
/// ```
pub fn load_options(path: &Path) -> Result<CrawlerOptions, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_options(&content)
}

/// Parses and validates options from TOML text
pub fn parse_options(content: &str) -> Result<CrawlerOptions, ConfigError> {
    let options: CrawlerOptions = toml::from_str(content)?;
    validate(&options)?;
    Ok(options)
}

/// Computes a SHA-256 hash of the options file content
///
/// Exporters record this so that runs made with different options can be told
/// apart.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_options_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Hex-encoded SHA-256 of arbitrary option text
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads options and returns both the options and their hash
pub fn load_options_with_hash(path: &Path) -> Result<(CrawlerOptions, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let options = parse_options(&content)?;
    Ok((options, hash_content(&content)))
}
