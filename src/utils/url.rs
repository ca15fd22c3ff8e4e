//! URL helpers for building Ollama endpoints from a user-supplied host.
//!
//! Hosts come from flags, environment variables and config files, so they
//! arrive with or without trailing slashes and sometimes without a scheme.

use reqwest::Url;

/// Remove trailing slashes so endpoints can be appended without doubling them.
///
/// ```
/// use ollamatui::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://gpu-box/ollama///"), "http://gpu-box/ollama");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a host and an endpoint path such as `api/generate`.
///
/// Any path prefix on the host is kept, which matters for servers mounted
/// behind a reverse proxy.
///
/// ```
/// use ollamatui::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434", "api/tags"),
///     "http://localhost:11434/api/tags"
/// );
/// assert_eq!(
///     construct_api_url("https://proxy.example.com/ollama/", "/api/embed"),
///     "https://proxy.example.com/ollama/api/embed"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Same as [`construct_api_url`] for an already validated host.
pub fn endpoint_url(host: &Url, endpoint: &str) -> String {
    construct_api_url(host.as_str(), endpoint)
}

/// Reasons a host string cannot be used to reach a server.
pub fn host_problem(url: &Url) -> Option<&'static str> {
    if !matches!(url.scheme(), "http" | "https") {
        return Some("scheme must be http or https");
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Some("missing host name");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:11434"),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_base_url("http://localhost:11434/"),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_base_url("  http://localhost:11434//  "),
            "http://localhost:11434"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("http://localhost:11434", "api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            construct_api_url("http://localhost:11434/", "/api/generate"),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            construct_api_url("http://host/prefix///", "api/tags"),
            "http://host/prefix/api/tags"
        );
    }

    #[test]
    fn endpoint_url_drops_the_implicit_root_slash() {
        let host = Url::parse("http://localhost:11434").unwrap();
        // Url renders a bare host with a trailing slash.
        assert_eq!(host.as_str(), "http://localhost:11434/");
        assert_eq!(
            endpoint_url(&host, "api/embed"),
            "http://localhost:11434/api/embed"
        );
    }

    #[test]
    fn host_problem_rejects_non_http_schemes() {
        let ftp = Url::parse("ftp://example.com").unwrap();
        assert_eq!(host_problem(&ftp), Some("scheme must be http or https"));

        let ok = Url::parse("https://example.com:8443").unwrap();
        assert_eq!(host_problem(&ok), None);
    }
}
