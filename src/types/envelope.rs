use serde::Serialize;

/// Uniform response body for every boundary operation:
/// `{status, message, data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// A read that returned data.
    pub fn fetched(data: T) -> Self {
        Envelope {
            status: true,
            message: "Successfully Fetched".to_string(),
            data,
        }
    }
}

impl Envelope<String> {
    /// A write acknowledged with a human-readable message.
    pub fn success(message: &str) -> Self {
        Envelope {
            status: true,
            message: message.to_string(),
            data: message.to_string(),
        }
    }
}
