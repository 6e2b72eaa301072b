// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器
//!
//! `App` 把路由、静态资源处理器、错误响应器与访问日志组装在一起，
//! 并驱动单个连接上的请求循环。

use std::{any::Any, sync::Arc, time::Instant};

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    access::{AccessEntry, AccessLog, LogAccessLogger},
    config::Config,
    connection::Connection,
    exception::Exception,
    handler,
    listing::ListingAssets,
    param::{HttpRequestMethod, MAX_DISCARDED_BODY, STATIC_METHODS},
    request::Request,
    responder::ErrorResponder,
    response::Response,
    router::{FixedRoute, FixedSource, Route, Router},
};

pub struct App {
    router: Router,
    assets: ListingAssets,
    responder: ErrorResponder,
    access: Arc<dyn AccessLog>,
}

impl App {
    pub fn new(
        router: Router,
        assets: ListingAssets,
        responder: ErrorResponder,
        access: Arc<dyn AccessLog>,
    ) -> Self {
        Self {
            router,
            assets,
            responder,
            access,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        let access: Arc<dyn AccessLog> = Arc::new(LogAccessLogger);
        Self::with_access_log(config, access)
    }

    /// 使用指定的访问日志输出端构建
    pub fn with_access_log(config: &Config, access: Arc<dyn AccessLog>) -> Result<Self, Exception> {
        let router = Router::from_config(config)?;
        let assets = ListingAssets {
            stylesheet: config.stylesheet().to_string(),
            font_url: config.font_url().to_string(),
        };
        let responder = ErrorResponder::new(
            config.debug(),
            config.ignored_status_codes(),
            Arc::clone(&access),
        );
        Ok(Self::new(router, assets, responder, access))
    }

    /// 把一个请求分派到对应的处理逻辑
    pub async fn dispatch(&self, request: &Request) -> Result<Response, Exception> {
        match self.router.route(request.path())? {
            Route::Fixed(route) => {
                check_read_only(request)?;
                serve_fixed(route).await
            }
            Route::Static { root, segment } => {
                check_read_only(request)?;
                handler::handle(root, segment, request.path(), &self.assets).await
            }
            Route::Redirect(url) => Ok(Response::redirect(302, url)),
            Route::Unmatched => Err(Exception::NotFound),
        }
    }

    /// 在独立任务中分派，处理器 panic 转为 `Internal`
    async fn dispatch_isolated(self: &Arc<Self>, request: &Request) -> Result<Response, Exception> {
        let app = Arc::clone(self);
        let request = request.clone();
        match tokio::spawn(async move { app.dispatch(&request).await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Exception::internal(format!(
                "处理器panic：{}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(Exception::internal(e.to_string())),
        }
    }

    /// 驱动一个连接，直到对端关闭或响应要求关闭。
    pub async fn serve<S>(self: Arc<Self>, stream: S, peer: String, id: u128)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut conn = Connection::new(stream, peer);
        loop {
            conn.begin_request();
            let head = match conn.read_head(id).await {
                Ok(Some(head)) => head,
                Ok(None) => break,
                Err(e) => {
                    self.fail(&mut conn, e, None, id).await;
                    break;
                }
            };

            let start_time = Instant::now();
            let request = match Request::try_from(&head, id) {
                Ok(request) => request,
                Err(e) => {
                    self.fail(&mut conn, e, None, id).await;
                    break;
                }
            };
            debug!("[ID{}]成功解析HTTP请求：{} {}", id, request.method(), request.path());

            // 请求体必须在读取下一个请求头之前处理掉
            let must_close = match skip_body(&mut conn, &request, id).await {
                Ok(must_close) => must_close,
                Err(e) => {
                    self.fail(&mut conn, e, Some(&request), id).await;
                    break;
                }
            };

            let mut response = match self.dispatch_isolated(&request).await {
                Ok(response) => response,
                Err(e) => {
                    self.fail(&mut conn, e, Some(&request), id).await;
                    break;
                }
            };

            if must_close {
                response.force_close();
            }
            let head_only = request.method() == HttpRequestMethod::Head;
            if let Err(e) = conn.send(&mut response, head_only).await {
                self.fail(&mut conn, e, Some(&request), id).await;
                break;
            }
            debug!(
                "[ID{}]HTTP响应发送完成，共{}字节，用时{}ms",
                id,
                conn.output_size(),
                start_time.elapsed().as_millis()
            );
            self.access.log(&AccessEntry::new(
                Some(&request),
                conn.peer(),
                &response,
                start_time.elapsed(),
            ));

            if response.is_force_close() || !request.keep_alive() {
                break;
            }
        }
        conn.shutdown().await;
        debug!("[ID{}]TCP连接已关闭", id);
    }

    /// 请求失败后的统一出口：交给错误响应器，能发送则发送。
    async fn fail<S>(
        &self,
        conn: &mut Connection<S>,
        cause: Exception,
        request: Option<&Request>,
        id: u128,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if cause.is_transport_fault() {
            error!("[ID{}]{}，断开连接", id, cause);
            return;
        }
        debug!("[ID{}]请求失败：{}", id, cause);

        let ctx = self.responder.context(cause, request);
        match self
            .responder
            .respond(&ctx, request, conn.peer(), conn.output_size())
        {
            Ok(mut response) => {
                let head_only = request.map_or(false, |r| r.method() == HttpRequestMethod::Head);
                if let Err(e) = conn.send(&mut response, head_only).await {
                    warn!("[ID{}]发送错误响应失败：{}", id, e);
                }
            }
            Err(e) => error!("[ID{}]{}，断开连接", id, e),
        }
    }
}

/// 丢弃请求体。返回响应后是否必须关闭连接：
/// 分块传输或超过 `MAX_DISCARDED_BODY` 的请求体不读取，连接在响应后关闭。
async fn skip_body<S>(conn: &mut Connection<S>, request: &Request, id: u128) -> Result<bool, Exception>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if request.is_transfer_encoded() {
        debug!("[ID{}]请求体使用Transfer-Encoding，响应后关闭连接", id);
        return Ok(true);
    }
    match request.content_length() {
        Some(length) if length > MAX_DISCARDED_BODY => {
            debug!("[ID{}]请求体过大（{}字节），响应后关闭连接", id, length);
            Ok(true)
        }
        Some(length) if length > 0 => {
            conn.discard_body(length).await?;
            debug!("[ID{}]已丢弃{}字节的请求体", id, length);
            Ok(false)
        }
        _ => Ok(false),
    }
}

fn check_read_only(request: &Request) -> Result<(), Exception> {
    if request.method().is_read_only() {
        Ok(())
    } else {
        Err(Exception::MethodNotAllowed(STATIC_METHODS))
    }
}

async fn serve_fixed(route: &FixedRoute) -> Result<Response, Exception> {
    match route.source() {
        FixedSource::Body(body) => Ok(Response::from_bytes(
            200,
            route.content_type().unwrap_or("text/plain; charset=utf-8"),
            body.clone(),
        )),
        FixedSource::File(path) => {
            let content = match tokio::fs::read(path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("固定路由{}的文件{}不存在", route.path(), path.display());
                    return Err(Exception::NotFound);
                }
                Err(e) => return Err(e.into()),
            };
            let content_type = match route.content_type() {
                Some(t) => t.to_string(),
                None => mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .to_string(),
            };
            Ok(Response::from_bytes(200, &content_type, content))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知panic".to_string()
    }
}

/// 在当前线程上记录启动信息
pub fn log_startup(config: &Config) {
    info!("调试模式：{}", config.debug());
    for mount in config.mounts() {
        info!(
            "静态目录 {} -> {}（目录列表：{}）",
            mount.prefix,
            mount.root.display(),
            mount.show_index
        );
    }
    if let Some(url) = config.fallback_redirect() {
        info!("未匹配的请求将重定向至{}", url);
    }
}
