// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 错误响应器
//!
//! 把任何未处理的失败转换为完整的 HTTP 错误响应：
//! - 同一请求已经写出过响应字节时直接返回 `ResponseAlreadySent`，不再发送任何内容。
//! - `500` 在调试模式下尽力附带错误链与调用栈；采集过程中的任何 panic 都被吞掉。
//! - 客户端 `Accept` 含 `text/html` 时返回 HTML，否则返回纯文本。
//! - 所有错误响应都强制关闭连接。
//! - 忽略列表中的状态码不写错误日志，但仍然记录访问日志（耗时记为 0）。

use std::{
    backtrace::BacktraceStatus,
    error::Error,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use log::{debug, error};

use crate::{
    access::{AccessEntry, AccessLog},
    exception::Exception,
    listing::escape_html,
    param::{reason_phrase, status_description},
    request::Request,
    response::Response,
};

/// 仅在失败时构造的单请求上下文
#[derive(Debug, Clone)]
pub struct ErrorContext {
    status: u16,
    cause: Option<Exception>,
    debug: bool,
    accepts_html: bool,
    message: Option<String>,
}

impl ErrorContext {
    pub fn new(status: u16, cause: Option<Exception>, debug: bool, accepts_html: bool) -> Self {
        Self {
            status,
            cause,
            debug,
            accepts_html,
            message: None,
        }
    }

    /// 非 500 状态使用的调用方文本，原样作为响应体
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub struct ErrorResponder {
    debug: bool,
    ignored_status_codes: Vec<u16>,
    access: Arc<dyn AccessLog>,
}

impl ErrorResponder {
    pub fn new(debug: bool, ignored_status_codes: &[u16], access: Arc<dyn AccessLog>) -> Self {
        Self {
            debug,
            ignored_status_codes: ignored_status_codes.to_vec(),
            access,
        }
    }

    /// 由异常与（可能缺失的）请求构造上下文。
    ///
    /// 请求侧错误的描述直接作为响应体，告诉客户端请求错在哪里。
    pub fn context(&self, cause: Exception, request: Option<&Request>) -> ErrorContext {
        let message = match &cause {
            Exception::RequestIsNotUtf8
            | Exception::MalformedRequest(_)
            | Exception::HeaderTooLarge
            | Exception::UnSupportedRequestMethod
            | Exception::UnsupportedHttpVersion
            | Exception::InvalidPath => Some(cause.to_string()),
            _ => None,
        };
        let ctx = ErrorContext::new(
            cause.status_code(),
            Some(cause),
            self.debug,
            request.map_or(false, |r| r.accepts_html()),
        );
        match message {
            Some(message) => ctx.with_message(message),
            None => ctx,
        }
    }

    /// 该状态码是否写入错误日志
    pub fn should_log(&self, status: u16) -> bool {
        !self.ignored_status_codes.contains(&status)
    }

    /// 生成错误响应。
    ///
    /// # 参数
    /// * `bytes_sent` - 当前请求已写出的响应字节数，大于 0 时无法再发送响应。
    pub fn respond(
        &self,
        ctx: &ErrorContext,
        request: Option<&Request>,
        peer: &str,
        bytes_sent: u64,
    ) -> Result<Response, Exception> {
        if bytes_sent > 0 {
            return Err(Exception::ResponseAlreadySent);
        }

        let mut response = if ctx.status == 500 {
            internal_error_response(ctx)
        } else {
            let message = ctx
                .message
                .clone()
                .unwrap_or_else(|| format!("{}: {}", ctx.status, reason_phrase(ctx.status)));
            Response::from_text(ctx.status, message)
        };
        if let Some(Exception::MethodNotAllowed(methods)) = &ctx.cause {
            response.set_allow(methods);
        }
        response.force_close();

        if self.should_log(ctx.status) {
            match &ctx.cause {
                Some(cause) => error!("Error handling request: {}", cause),
                None => error!("Error handling request: status {}", ctx.status),
            }
        } else {
            debug!("状态码{}在忽略列表中，不记录错误", ctx.status);
        }

        self.access
            .log(&AccessEntry::new(request, peer, &response, Duration::ZERO));
        Ok(response)
    }
}

fn internal_error_response(ctx: &ErrorContext) -> Response {
    let title = format!("{} {}", 500, reason_phrase(500));
    let mut msg = status_description(500).to_string();
    let trace = if ctx.debug {
        capture_traceback(ctx.cause.as_ref())
    } else {
        None
    };

    if ctx.accepts_html {
        if let Some(tb) = trace {
            msg = format!("<h2>Traceback:</h2>\n<pre>{}</pre>", escape_html(&tb));
        }
        Response::from_html(
            500,
            format!(
                "<html><head><title>{title}</title></head><body>\n<h1>{title}</h1>\n{msg}\n</body></html>\n"
            ),
        )
    } else {
        if let Some(tb) = trace {
            msg = tb;
        }
        Response::from_text(500, format!("{title}\n\n{msg}"))
    }
}

/// 错误链加上已捕获的调用栈。采集失败时返回 `None`。
fn capture_traceback(cause: Option<&Exception>) -> Option<String> {
    let cause = cause?;
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut trace = format!("{}\n", cause);
        let mut source = cause.source();
        while let Some(s) = source {
            trace.push_str(&format!("Caused by: {}\n", s));
            source = s.source();
        }
        if let Some(bt) = cause.backtrace() {
            if bt.status() == BacktraceStatus::Captured {
                trace.push_str(&format!("\nStack backtrace:\n{}", bt));
            }
        }
        trace
    }))
    .ok()
}
