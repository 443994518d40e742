//! Drives an image through upload, correction and cloud segmentation.
//!
//! Stages run strictly one after another. The first stage that returns a
//! system error or lacks the expected field stops the run and moves the
//! status to [`ProcessingStatus::Error`]. Transport, parse and schema errors
//! end the run the same way, with the error text kept in
//! [`ViewState::last_error`].
//!
//! Runs are serialized. Selecting a new image while a run is in flight does
//! not cancel it, but whatever that run would have written is dropped.

use crate::config::{ClientConfig, Endpoints};
use crate::gateway::{Gateway, GatewayError, RequestOptions};
use crate::io_struct::{LoadImageResponse, PathRequest, PathResponse, ServerImagesResponse};
use crate::logging::Logger;
use crate::models::{ProcessingStatus, ServerImageEntry, UploadedImage, ViewSnapshot, ViewState};
use crate::server_images::{image_name_from_url, sort_by_timestamp};
use crate::transport::FormData;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerImageList {
    pub loaded: bool,
    pub images: Vec<ServerImageEntry>,
}

pub struct Pipeline {
    gateway: Gateway,
    endpoints: Endpoints,
    state: RwLock<ViewState>,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(gateway: Gateway, endpoints: Endpoints) -> Self {
        Pipeline {
            gateway,
            endpoints,
            state: RwLock::new(ViewState::default()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ClientConfig, logger: Arc<dyn Logger>) -> anyhow::Result<Self> {
        let gateway = Gateway::new(config.build_transport()?, logger);
        Ok(Self::new(gateway, config.endpoints()))
    }

    fn logger(&self) -> &Arc<dyn Logger> {
        self.gateway.logger()
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn server_image_list(&self) -> ServerImageList {
        let state = self.state.read().await;
        let mut images = state.server_images.clone();
        sort_by_timestamp(&mut images);
        ServerImageList {
            loaded: state.server_images_loaded,
            images,
        }
    }

    pub async fn select_local_file(&self, name: &str, bytes: Bytes) -> ViewSnapshot {
        self.select(UploadedImage::from_file(name, bytes)).await
    }

    /// Picks an image that already lives on the server.
    pub async fn select_server_image(&self, url: &str) -> ViewSnapshot {
        self.select(UploadedImage::from_url(url)).await
    }

    async fn select(&self, image: UploadedImage) -> ViewSnapshot {
        self.logger().log("Image selected:", &image);
        let mut state = self.state.write().await;
        state.select(image);
        state.snapshot()
    }

    /// Asks the correction service for the newest satellite image and selects
    /// it. Returns `false` when the service had nothing usable to offer.
    pub async fn fetch_last_image(&self) -> Result<bool, GatewayError> {
        let result = self
            .gateway
            .make_request::<PathResponse>(&self.endpoints.last_image(), RequestOptions::get())
            .await?;
        match result.into_data().and_then(|d| d.path).filter(|p| !p.is_empty()) {
            Some(url) => {
                self.select(UploadedImage::from_url(url)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetches the list only when nothing is cached yet.
    pub async fn load_server_images(&self) -> Result<ServerImageList, GatewayError> {
        let cached = !self.state.read().await.server_images.is_empty();
        if !cached {
            self.refresh_server_images().await?;
        }
        Ok(self.server_image_list().await)
    }

    /// Replaces the cached list with what the server reports. A system error
    /// empties it.
    pub async fn refresh_server_images(&self) -> Result<(), GatewayError> {
        let result = self
            .gateway
            .make_request::<ServerImagesResponse>(
                &self.endpoints.server_images(),
                RequestOptions::get(),
            )
            .await?;
        let images: Vec<ServerImageEntry> = result
            .into_data()
            .and_then(|d| d.server_images)
            .unwrap_or_default()
            .into_iter()
            .map(ServerImageEntry::from)
            .collect();

        let mut state = self.state.write().await;
        state.server_images = images;
        state.server_images_loaded = true;
        Ok(())
    }

    /// Runs the selected image through all three stages. Without a selected
    /// image this does nothing.
    pub async fn process_current_image(&self) -> ViewSnapshot {
        let _run = self.run_lock.lock().await;

        let (image, generation) = {
            let mut state = self.state.write().await;
            let Some(image) = state.uploaded_image.clone() else {
                return state.snapshot();
            };
            state.status = ProcessingStatus::Correction;
            state.processed_image_url = None;
            state.last_error = None;
            (image, state.generation)
        };

        match self.run_stages(&image, generation).await {
            Ok(Some(processed_url)) => {
                self.update(generation, |state| {
                    state.status = ProcessingStatus::Processed;
                    state.processed_image_url = Some(processed_url);
                })
                .await;
                if let Err(e) = self.refresh_server_images().await {
                    self.logger()
                        .warn("Server image list was not refreshed:", &e.to_string());
                }
            }
            Ok(None) => {
                self.update(generation, |state| state.status = ProcessingStatus::Error)
                    .await;
            }
            Err(e) => {
                self.logger().error("Pipeline aborted:", &image.display_url, &e);
                self.update(generation, |state| {
                    state.status = ProcessingStatus::Error;
                    state.last_error = Some(e.to_string());
                })
                .await;
            }
        }

        self.snapshot().await
    }

    async fn run_stages(
        &self,
        image: &UploadedImage,
        generation: u64,
    ) -> Result<Option<String>, GatewayError> {
        let Some(normal_url) = self.post_load_image(image).await? else {
            return Ok(None);
        };
        let Some(corrected_url) = self.post_correct_image(&normal_url).await? else {
            return Ok(None);
        };

        let shown = corrected_url.clone();
        self.update(generation, |state| {
            state.processed_image_url = Some(shown);
            state.status = ProcessingStatus::CloudSegmentation;
        })
        .await;

        self.post_segment_clouds(&corrected_url).await
    }

    async fn post_load_image(&self, image: &UploadedImage) -> Result<Option<String>, GatewayError> {
        let preview_name = image_name_from_url(&image.display_url);
        if image.source.is_none() && preview_name.is_empty() {
            self.logger()
                .warn("Nothing to upload, image has no file and no URL:", image);
            return Ok(None);
        }

        // An absent file still goes out as an empty part.
        let form = match &image.source {
            Some(file) => FormData::new().file("uploadFile", file.name.as_str(), file.bytes.clone()),
            None => FormData::new().file("uploadFile", "", Bytes::new()),
        }
        .text("previewFileName", preview_name);

        let result = self
            .gateway
            .make_request::<LoadImageResponse>(
                &self.endpoints.load_image(),
                RequestOptions::post_form(form),
            )
            .await?;
        Ok(result
            .into_data()
            .and_then(|d| d.image_url)
            .filter(|u| !u.is_empty()))
    }

    async fn post_correct_image(&self, url: &str) -> Result<Option<String>, GatewayError> {
        self.post_path(&self.endpoints.correct(), url).await
    }

    async fn post_segment_clouds(&self, url: &str) -> Result<Option<String>, GatewayError> {
        self.post_path(&self.endpoints.segment_clouds(), url).await
    }

    async fn post_path(&self, endpoint: &str, url: &str) -> Result<Option<String>, GatewayError> {
        let body = PathRequest::new(image_name_from_url(url));
        let result = self
            .gateway
            .make_request::<PathResponse>(endpoint, RequestOptions::post_json(&body)?)
            .await?;
        Ok(result
            .into_data()
            .and_then(|d| d.path)
            .filter(|p| !p.is_empty()))
    }

    /// Applies `f` unless another image was selected since `generation`.
    async fn update<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        let mut state = self.state.write().await;
        if state.generation != generation {
            self.logger()
                .warn("Dropping result of a superseded run:", &generation);
            return false;
        }
        f(&mut state);
        true
    }
}
