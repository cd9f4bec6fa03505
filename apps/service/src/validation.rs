use anyhow::{Result, anyhow};
use url::Url;

/// Validate a URL before it is registered as a monitored target
pub fn validate_target_url(target: &str) -> Result<Url> {
    if target.trim().is_empty() {
        return Err(anyhow!("Target URL cannot be empty"));
    }

    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(e) if !target.contains("://") => {
            return Err(anyhow!("URL must include scheme (http:// or https://): {e}"));
        }
        Err(e) => return Err(anyhow!("Invalid URL: {e}")),
    };

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(anyhow!("Invalid scheme '{scheme}'. Must be http or https"));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL must have a valid host"));
    }

    if url.port() == Some(0) {
        return Err(anyhow!("Port must be between 1 and 65535"));
    }

    Ok(url)
}

/// Loose sanity check for notification addresses
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err(anyhow!("Invalid email address '{email}'")),
    }
}
