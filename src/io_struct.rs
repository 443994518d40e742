use serde::{Deserialize, Serialize};

/// Body for `/correct` and `/segment-clouds`: the preview file name of the
/// image to work on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathRequest {
    pub path: String,
}

impl PathRequest {
    pub fn new(path: impl Into<String>) -> Self {
        PathRequest { path: path.into() }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoadImageResponse {
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

/// Response of `/correct`, `/segment-clouds` and `/last-image`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathResponse {
    pub path: Option<String>,
    // "precentage" is what the wire says; the segmentation service spells it
    // correctly.
    #[serde(rename = "cloud_precentage", alias = "cloud_percentage", default)]
    pub cloud_precentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerImage {
    pub normal: String,
    pub corrected: Option<String>,
    pub processed: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerImagesResponse {
    #[serde(rename = "serverImages")]
    pub server_images: Option<Vec<ServerImage>>,
}
