use crate::consts;
use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    HttpMessage,
};
use domain::value::UserId;
use log::debug;

/// 请求方的用户 ID
#[derive(Clone, Copy, Debug)]
pub struct CallerId(pub UserId);

/// 从请求头中解析用户 ID，放进 request extensions；格式不对时视为匿名
pub async fn caller_identity(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let header = req
        .headers()
        .get(consts::USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string());

    if let Some(raw) = header {
        match raw.parse::<i64>() {
            Ok(id) => {
                req.extensions_mut().insert(CallerId(UserId::from(id)));
            }
            Err(_) => debug!("Ignoring malformed {} header: {}", consts::USER_ID_HEADER, raw),
        }
    }

    next.call(req).await
}

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "DELETE", "HEAD"])
        .allow_any_header()
        .max_age(3600)
}
