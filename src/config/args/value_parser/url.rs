use url::Url;

const INVALID_SCHEME: &str = "scheme must be https:// or http:// .";
const NO_HOST: &str = "endpoint url must have a host.";
const QUERY_NOT_ALLOWED: &str = "endpoint url must not have a query or a fragment.";

pub fn check_scheme(url: &str) -> Result<String, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(INVALID_SCHEME.to_string());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(NO_HOST.to_string());
    }
    // Session API paths are appended to the endpoint url.
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(QUERY_NOT_ALLOWED.to_string());
    }

    Ok(url.to_string())
}
