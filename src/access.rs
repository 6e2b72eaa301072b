// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问日志
//!
//! 每个响应（包括错误响应）对应一行访问日志，写入 `access` 日志目标，
//! 由 log4rs 配置路由到单独的输出。

use std::time::Duration;

use log::info;

use crate::{request::Request, response::Response};

/// 一条访问记录
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEntry {
    pub host: String,
    pub peer: String,
    pub status: u16,
    pub method: String,
    pub path: String,
    pub version: String,
    pub body_length: u64,
    pub user_agent: String,
    pub elapsed: Duration,
}

impl AccessEntry {
    /// 请求解析失败时 `request` 为 `None`，对应字段记为 `-`
    pub fn new(
        request: Option<&Request>,
        peer: &str,
        response: &Response,
        elapsed: Duration,
    ) -> Self {
        Self {
            host: request.and_then(|r| r.host()).unwrap_or("-").to_string(),
            peer: peer.to_string(),
            status: response.status_code(),
            method: request.map_or("-".to_string(), |r| r.method().to_string()),
            path: request.map_or("-".to_string(), |r| r.raw_path().to_string()),
            version: request.map_or("-".to_string(), |r| format!("HTTP/{}", r.version())),
            body_length: response.content_length(),
            user_agent: request.map_or("-".to_string(), |r| r.user_agent().to_string()),
            elapsed,
        }
    }

    /// `[http://host] peer status "METHOD /path HTTP/1.1" [n bytes] "UA" 1.234ms`
    pub fn format(&self) -> String {
        format!(
            "[http://{}] {} {} \"{} {} {}\" [{} bytes] \"{}\" {:.3}ms",
            self.host,
            self.peer,
            self.status,
            self.method,
            self.path,
            self.version,
            self.body_length,
            self.user_agent,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

/// 访问日志的输出端
#[cfg_attr(test, mockall::automock)]
pub trait AccessLog: Send + Sync {
    fn log(&self, entry: &AccessEntry);
}

/// 写入 `access` 日志目标的默认实现
#[derive(Debug, Default)]
pub struct LogAccessLogger;

impl AccessLog for LogAccessLogger {
    fn log(&self, entry: &AccessEntry) {
        info!(target: "access", "{}", entry.format());
    }
}
