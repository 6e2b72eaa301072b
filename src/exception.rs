// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义请求处理生命周期中可能出现的全部异常。
//!
//! ## 分类
//! - **请求侧错误**：报文无法解析、方法或版本不受支持，统一映射为 `400`。
//! - **策略错误**：`Forbidden` 与 `NotFound`，由路径解析器与静态资源处理器产生。
//!   文件系统的原始错误在边界处被重新归类，不会泄露给客户端。
//! - **内部错误**：`Internal` / `Io`，映射为 `500`，仅在调试模式下附带诊断信息。
//! - **传输层不变量违规**：`ResponseAlreadySent`，不可恢复，绝不会被转换成第二个响应。

use std::{backtrace::Backtrace, io, sync::Arc};

use thiserror::Error;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Clone, Error)]
pub enum Exception {
    /// 请求字节流不是合法的 UTF-8。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 请求行或请求头格式不正确。
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    /// 请求头超过了允许的最大长度。
    #[error("Request header too large")]
    HeaderTooLarge,
    /// 解析器不认识的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,
    /// 不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 路径无法被百分号解码为 UTF-8。
    #[error("Invalid path (400)")]
    InvalidPath,
    /// 资源存在，但不接受该方法。携带允许的方法列表。
    #[error("Method not allowed")]
    MethodNotAllowed(&'static [&'static str]),
    /// 策略拒绝访问该位置。
    #[error("Forbidden (403)")]
    Forbidden,
    /// 目标不存在，或无法安全地向客户端确认其存在。
    #[error("Not found (404)")]
    NotFound,
    /// 请求处理中出现的意外故障。
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        trace: Arc<Backtrace>,
    },
    /// 意外的 I/O 错误。
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
    /// 同一请求已经写出过响应字节，无法再发送任何响应。
    #[error("Response is sent already, cannot send another response with the error message")]
    ResponseAlreadySent,
    /// 启动阶段的配置错误。
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Exception {
    /// 构造 `Internal`，并在 `RUST_BACKTRACE` 启用时捕获调用栈。
    pub fn internal(message: impl Into<String>) -> Self {
        Exception::Internal {
            message: message.into(),
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// 映射到 HTTP 状态码。
    pub fn status_code(&self) -> u16 {
        match self {
            Exception::RequestIsNotUtf8
            | Exception::MalformedRequest(_)
            | Exception::UnSupportedRequestMethod
            | Exception::UnsupportedHttpVersion
            | Exception::InvalidPath => 400,
            Exception::HeaderTooLarge => 431,
            Exception::MethodNotAllowed(_) => 405,
            Exception::Forbidden => 403,
            Exception::NotFound => 404,
            Exception::Internal { .. }
            | Exception::Io(_)
            | Exception::ResponseAlreadySent
            | Exception::InvalidConfig(_) => 500,
        }
    }

    /// 错误发生时捕获到的调用栈（仅 `Internal` 携带）。
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            Exception::Internal { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// 是否属于传输层不变量违规。调用方必须据此直接断开连接。
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Exception::ResponseAlreadySent)
    }
}

impl From<io::Error> for Exception {
    fn from(e: io::Error) -> Self {
        Exception::Io(Arc::new(e))
    }
}
