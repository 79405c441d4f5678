pub const URL_PATH_NATIVE_API: &str = "/api";
pub const URL_PATH_PRESENCE_WS: &str = "/ws/online";

/// 调用方身份，会话语义由上游网关负责
pub const USER_ID_HEADER: &str = "X-User-Id";
