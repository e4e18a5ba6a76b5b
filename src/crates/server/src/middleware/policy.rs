use crate::error::ApiError;
use crate::AppState;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, HttpMessage,
};
use application::context::AuthorizationContext;
use application::error::AppError;
use application::policy::{AccessDenied, HttpMethod};
use log::warn;

/// Consults the policy table with the context left by `SecurityContextResolver`.
/// Must be wrapped inside the resolver.
pub async fn enforce_policy(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, actix_web::Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        let err = ApiError(AppError::UnknownError("AppState missing".to_string()));
        return Ok(req.error_response(err).map_into_right_body());
    };

    let ctx = req
        .extensions()
        .get::<AuthorizationContext>()
        .cloned()
        .unwrap_or_default();
    let path = req.match_info().as_str().to_string();

    // 表里不认识的方法按默认规则处理：需要登录
    let decision = match req.method().as_str().parse::<HttpMethod>() {
        Ok(method) => state.policy.authorize(method, &path, &ctx),
        Err(_) if ctx.is_authenticated() => Ok(()),
        Err(_) => Err(AccessDenied::Unauthorized),
    };

    match decision {
        Ok(()) => next.call(req).await.map(|res| res.map_into_left_body()),
        Err(denied) => {
            warn!(
                "{} {} denied for {}: {}",
                req.method(),
                path,
                ctx.username().unwrap_or("anonymous"),
                denied
            );
            Ok(req.error_response(ApiError::from(denied)).map_into_right_body())
        }
    }
}
