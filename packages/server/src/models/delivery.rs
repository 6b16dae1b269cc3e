use serde::Serialize;

/// Response DTO for a successful delivery.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DownloadResponse {
    /// Presigned, expiring URL for the freshly watermarked artifact.
    pub download_url: String,
    /// Seconds until both the URL and the temporary artifact expire.
    #[schema(example = 3600)]
    pub expires_in: u64,
    pub script_title: String,
    /// Suggested filename for the downloaded file.
    #[schema(example = "a-doll-s-house-0193aaaa.pdf")]
    pub filename: String,
}
