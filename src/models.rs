use crate::io_struct::ServerImage;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RETRY_MESSAGE: &str = "Oops, please try again.";

/// Bytes of an image picked from the local disk.
#[derive(Clone)]
pub struct LocalFile {
    pub name: String,
    pub bytes: Bytes,
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The image currently selected for processing. Replaced wholesale on every
/// selection.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub source: Option<LocalFile>,
    pub display_url: String,
}

impl UploadedImage {
    pub fn from_file(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        UploadedImage {
            display_url: format!("file:///{}", name),
            source: Some(LocalFile {
                name,
                bytes: bytes.into(),
            }),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        UploadedImage {
            source: None,
            display_url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStatus {
    #[default]
    Uploaded,
    Correction,
    CloudSegmentation,
    Processed,
    Error,
}

impl ProcessingStatus {
    pub fn text(&self) -> &'static str {
        match self {
            ProcessingStatus::Uploaded => "Image uploaded",
            ProcessingStatus::Correction => "Correcting image...",
            ProcessingStatus::CloudSegmentation => "Segmenting clouds...",
            ProcessingStatus::Processed => "Image processed",
            ProcessingStatus::Error => "Processing failed",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStatus::Uploaded => "uploaded",
            ProcessingStatus::Correction => "correction",
            ProcessingStatus::CloudSegmentation => "cloud-segmentation",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerImageEntry {
    pub normal_url: String,
    pub corrected_url: Option<String>,
    pub processed_url: Option<String>,
}

impl From<ServerImage> for ServerImageEntry {
    fn from(image: ServerImage) -> Self {
        ServerImageEntry {
            normal_url: image.normal,
            corrected_url: image.corrected,
            processed_url: image.processed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub uploaded_image: Option<UploadedImage>,
    pub processed_image_url: Option<String>,
    pub status: ProcessingStatus,
    pub server_images: Vec<ServerImageEntry>,
    pub server_images_loaded: bool,
    pub last_error: Option<String>,
    /// Bumped on every image selection.
    pub generation: u64,
}

impl ViewState {
    pub fn select(&mut self, image: UploadedImage) {
        self.uploaded_image = Some(image);
        self.processed_image_url = None;
        self.status = ProcessingStatus::Uploaded;
        self.last_error = None;
        self.generation += 1;
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let status_text = match &self.uploaded_image {
            None => "Waiting for upload",
            Some(_) => self.status.text(),
        };
        ViewSnapshot {
            status: self.status,
            status_text: status_text.to_string(),
            uploaded_image_url: self.uploaded_image.as_ref().map(|i| i.display_url.clone()),
            has_local_file: self
                .uploaded_image
                .as_ref()
                .is_some_and(|i| i.source.is_some()),
            processed_image_url: self.processed_image_url.clone(),
            message: (self.status == ProcessingStatus::Error).then(|| RETRY_MESSAGE.to_string()),
            last_error: self.last_error.clone(),
        }
    }
}

/// What the front end shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub status: ProcessingStatus,
    pub status_text: String,
    pub uploaded_image_url: Option<String>,
    pub has_local_file: bool,
    pub processed_image_url: Option<String>,
    pub message: Option<String>,
    pub last_error: Option<String>,
}
