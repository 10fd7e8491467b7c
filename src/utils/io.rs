use crate::error::Result;

/// Reads a configuration source: `http(s)` links are fetched with `client`,
/// anything else is a local path.
pub async fn read_source(
    client: &reqwest::Client,
    location: &str,
) -> Result<String> {
    if is_remote(location) {
        let body = client
            .get(location)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        return Ok(body);
    }

    Ok(tokio::fs::read_to_string(location).await?)
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
