use crate::config::ClientConfig;
use crate::pipeline::Pipeline;
use crate::server_images::image_name_from_url;
use actix_web::{HttpRequest, HttpResponse, HttpServer, get, post, web};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ServerImageSelection {
    pub url: String,
}

#[get("/health")]
pub async fn health(_req: HttpRequest, _: web::Data<Pipeline>) -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[get("/status")]
pub async fn status(_req: HttpRequest, app_state: web::Data<Pipeline>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.snapshot().await)
}

/// The name doubles as `previewFileName`, so it must survive being read back
/// as the last segment of a URL.
fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && image_name_from_url(name) == name
        && !name.contains(['\\', '?', '#'])
}

/// Raw image bytes in the body, original file name in `?name=`.
#[post("/image")]
pub async fn select_file(
    query: web::Query<FileQuery>,
    body: web::Bytes,
    app_state: web::Data<Pipeline>,
) -> Result<HttpResponse, actix_web::Error> {
    if !is_plain_file_name(&query.name) {
        return Err(actix_web::error::ErrorBadRequest(
            "name must be a plain file name",
        ));
    }
    if body.is_empty() {
        return Err(actix_web::error::ErrorBadRequest("image body is empty"));
    }
    let snapshot = app_state.select_local_file(&query.name, body).await;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[post("/image/server")]
pub async fn select_server_image(
    req: web::Json<ServerImageSelection>,
    app_state: web::Data<Pipeline>,
) -> Result<HttpResponse, actix_web::Error> {
    if req.url.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest("url is empty"));
    }
    let snapshot = app_state.select_server_image(&req.url).await;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[post("/image/last")]
pub async fn fetch_last_image(
    _req: HttpRequest,
    app_state: web::Data<Pipeline>,
) -> Result<HttpResponse, actix_web::Error> {
    let selected = app_state
        .fetch_last_image()
        .await
        .map_err(actix_web::error::ErrorBadGateway)?;
    Ok(HttpResponse::Ok().json(json!({
        "selected": selected,
        "view": app_state.snapshot().await,
    })))
}

#[post("/process")]
pub async fn process(_req: HttpRequest, app_state: web::Data<Pipeline>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.process_current_image().await)
}

#[get("/server_images")]
pub async fn server_images(
    _req: HttpRequest,
    app_state: web::Data<Pipeline>,
) -> Result<HttpResponse, actix_web::Error> {
    let list = app_state
        .load_server_images()
        .await
        .map_err(actix_web::error::ErrorBadGateway)?;
    Ok(HttpResponse::Ok().json(list))
}

#[post("/server_images/refresh")]
pub async fn refresh_server_images(
    _req: HttpRequest,
    app_state: web::Data<Pipeline>,
) -> Result<HttpResponse, actix_web::Error> {
    app_state
        .refresh_server_images()
        .await
        .map_err(actix_web::error::ErrorBadGateway)?;
    Ok(HttpResponse::Ok().json(app_state.server_image_list().await))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(status)
        .service(fetch_last_image)
        .service(select_server_image)
        .service(select_file)
        .service(process)
        .service(server_images)
        .service(refresh_server_images);
}

pub async fn startup(config: ClientConfig, pipeline: web::Data<Pipeline>) -> std::io::Result<()> {
    log::info!(
        "Starting control API at {}:{} (main service {}, correction service {})",
        config.host,
        config.port,
        config.main_service_url,
        config.correction_service_url
    );

    let max_upload_bytes = config.max_upload_bytes;
    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(pipeline.clone())
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .configure(configure)
    })
    .bind((config.host, config.port))?
    .run()
    .await?;

    std::io::Result::Ok(())
}
