use actix_web::dev::ServerHandle;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub content_type: Option<String>,
    pub body: web::Bytes,
}

#[derive(Default)]
struct BackendState {
    base_url: Mutex<String>,
    requests: Mutex<Vec<RecordedRequest>>,
    failing: Mutex<HashSet<String>>,
}

impl BackendState {
    fn record(&self, req: &HttpRequest, body: web::Bytes) -> bool {
        let path = req.path().trim_start_matches('/').to_string();
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let failing = self.failing.lock().unwrap().contains(&path);
        self.requests.lock().unwrap().push(RecordedRequest {
            path,
            content_type,
            body,
        });
        failing
    }

    fn base(&self) -> String {
        self.base_url.lock().unwrap().clone()
    }
}

/// Stand-in for both backend services on one port.
pub struct MockBackend {
    pub url: String,
    state: Arc<BackendState>,
    handle: ServerHandle,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        *state.base_url.lock().unwrap() = url.clone();

        let data = web::Data::from(state.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/load_image", web::post().to(load_image))
                .route("/correct", web::post().to(correct))
                .route("/segment-clouds", web::post().to(segment_clouds))
                .route("/last-image", web::get().to(last_image))
                .route("/server_images", web::get().to(server_images))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        MockBackend { url, state, handle }
    }

    /// Makes `endpoint` answer 500 with a JSON error body.
    pub fn fail(&self, endpoint: &str) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(endpoint.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.requests().iter().filter(|r| r.path == endpoint).count()
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn failure() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({"error": "backend failure"}))
}

fn path_of(body: &[u8]) -> String {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    value["path"].as_str().unwrap_or_default().to_string()
}

async fn load_image(req: HttpRequest, body: web::Bytes, state: web::Data<BackendState>) -> HttpResponse {
    if state.record(&req, body) {
        return failure();
    }
    HttpResponse::Ok().json(json!({
        "imageUrl": format!("{}/normal-images/n_sat_20250413_133423_104666.jpg", state.base()),
    }))
}

async fn correct(req: HttpRequest, body: web::Bytes, state: web::Data<BackendState>) -> HttpResponse {
    let name = path_of(&body);
    if state.record(&req, body) {
        return failure();
    }
    HttpResponse::Ok().json(json!({
        "path": format!("{}/corrected-images/c_{}", state.base(), name.trim_start_matches("n_")),
    }))
}

async fn segment_clouds(req: HttpRequest, body: web::Bytes, state: web::Data<BackendState>) -> HttpResponse {
    let name = path_of(&body);
    if state.record(&req, body) {
        return failure();
    }
    HttpResponse::Ok().json(json!({
        "path": format!("{}/processed-images/p_{}", state.base(), name.trim_start_matches("c_")),
        "cloud_percentage": 41.5,
    }))
}

async fn last_image(req: HttpRequest, state: web::Data<BackendState>) -> HttpResponse {
    if state.record(&req, web::Bytes::new()) {
        return failure();
    }
    HttpResponse::Ok().json(json!({
        "path": format!("{}/normal-images/n_sat_20250414_080000_000001.jpg", state.base()),
    }))
}

async fn server_images(req: HttpRequest, state: web::Data<BackendState>) -> HttpResponse {
    if state.record(&req, web::Bytes::new()) {
        return failure();
    }
    let base = state.base();
    HttpResponse::Ok().json(json!({
        "serverImages": [
            {
                "normal": format!("{}/normal-images/n_sat_20250413_133423_104666.jpg", base),
                "corrected": format!("{}/corrected-images/c_sat_20250413_133423_104666.jpg", base),
                "processed": format!("{}/processed-images/p_sat_20250413_133423_104666.jpg", base),
            },
            {
                "normal": format!("{}/normal-images/n_sat_20250101_000000_000000.jpg", base),
                "corrected": null,
                "processed": null,
            },
        ]
    }))
}
