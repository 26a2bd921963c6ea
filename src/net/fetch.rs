use crate::net::Response;

/// GETs `url` and buffers the whole body.
///
/// Only transport failures are errors; a 404 is a successful fetch with a 404 status.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Response, reqwest::Error> {
    let res = client.get(url).send().await?;
    Response::read(res).await
}
