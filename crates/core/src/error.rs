use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("photo has no image reference")]
    MissingImage,
    #[error("photo {0} is already saved")]
    AlreadySaved(i64),
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}
