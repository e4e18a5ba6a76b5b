use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Resource};
use application::error::AppError;
use application::storage::FileStorage;
use log::debug;

use crate::error::ApiError;
use crate::AppState;

/// 按公开 URL 读取已上传的文件。路径一律交给网关解析，越界或不存在都是 404。
pub async fn serve_file(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let not_found = || AppError::not_found("File", req.path());

    let path = state.storage.resolve(req.path()).ok_or_else(not_found)?;
    if !is_regular_file(&path).await {
        debug!("no stored file at {}", path.display());
        return Err(not_found().into());
    }

    let file = NamedFile::open_async(&path)
        .await
        .map_err(|e| AppError::file_operation(format!("cannot open {}", path.display()), e))?;
    Ok(file.into_response(&req))
}

async fn is_regular_file(path: &std::path::Path) -> bool {
    web::block({
        let path = path.to_path_buf();
        move || path.is_file()
    })
    .await
    .unwrap_or(false)
}

pub fn configure_service(uploads_path: &str) -> Resource {
    web::resource(format!("{}/{{category}}/{{name:.*}}", uploads_path.trim_end_matches('/')))
        .route(web::get().to(serve_file))
}
