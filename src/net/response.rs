/// A fetched scene or tile, fully buffered.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    /// Canonical reason phrase, `"Unknown"` for non-standard codes
    pub status_text: String,
    pub body: Vec<u8>,
}

impl Response {
    pub(crate) async fn read(res: reqwest::Response) -> Result<Self, reqwest::Error> {
        let status = res.status();

        Ok(Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body: res.bytes().await?.to_vec(),
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
