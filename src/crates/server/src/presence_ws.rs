use crate::{consts, AppState};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use application::presence::{ChannelSink, ConnectionId, ConnectionSink};
use futures::StreamExt;
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

/// 在线人数 WebSocket
///
/// 出站快照先进入连接自己的无界队列，由写任务发送；
/// 套接字卡住只会让这个连接的队列变长，不会阻塞其它连接的投递。
pub async fn online(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut inbound) = actix_ws::handle(&req, body)?;

    let id = ConnectionId::from(Uuid::new_v4().to_string());
    let (sink, mut outbound) = ChannelSink::new();
    let registry = Arc::clone(&state.presence);
    info!("Presence connection {} opened", id);

    // 写任务：队列关闭或者发送失败时退出，之后该连接会在下一轮投递时被清理
    let mut writer = session.clone();
    actix_web::rt::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if writer.text(payload).await.is_err() {
                break;
            }
        }
    });

    let sink: Arc<dyn ConnectionSink> = Arc::new(sink);
    registry.on_connect(id.clone(), sink).await;

    actix_web::rt::spawn(async move {
        let mut close_reason = None;
        while let Some(item) = inbound.next().await {
            match item {
                Ok(Message::Text(text)) => {
                    if let Err(e) = registry.on_message(&id, &text).await {
                        debug!("Ignoring message from {}: {}", id, e);
                    }
                }
                Ok(Message::Ping(bytes)) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(reason)) => {
                    close_reason = reason;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Presence connection {} failed: {}", id, e);
                    break;
                }
            }
        }

        registry.on_disconnect(&id).await;
        let _ = session.close(close_reason).await;
        info!("Presence connection {} closed", id);
    });

    Ok(response)
}

pub fn configure_service(svc: &mut web::ServiceConfig) {
    svc.route(consts::URL_PATH_PRESENCE_WS, web::get().to(online));
}
