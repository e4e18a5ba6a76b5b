use crate::AppState;
use actix_service::{forward_ready, Service, Transform};
use actix_web::{
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use application::context::AuthorizationContext;
use futures::future::{ok, ready, LocalBoxFuture, Ready};
use log::error;
use std::rc::Rc;

// Resolves who is asking and stores the `AuthorizationContext` in the request extensions.
// It never rejects a request; `enforce_policy` decides access afterwards.
// A request that already carries a context is passed through untouched, so wrapping the
// resolver twice is harmless.
pub struct SecurityContextResolver;

impl<S, B> Transform<S, ServiceRequest> for SecurityContextResolver
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityContextMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SecurityContextMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct SecurityContextMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SecurityContextMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let existing = req.extensions().get::<AuthorizationContext>().cloned();

        Box::pin(async move {
            let ctx = match state {
                Some(state) => {
                    let authorization = token_header(&req);
                    state
                        .pipeline
                        .resolve_once(existing, authorization.as_deref())
                        .await
                }
                None => {
                    error!("AppState missing, request treated as anonymous");
                    existing.unwrap_or_default()
                }
            };
            req.extensions_mut().insert(ctx);
            service.call(req).await
        })
    }
}

fn token_header(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// 处理函数里取当前请求的上下文
pub struct Auth(pub AuthorizationContext);

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = req
            .extensions()
            .get::<AuthorizationContext>()
            .cloned()
            .unwrap_or_default();
        ready(Ok(Auth(ctx)))
    }
}
