// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由
//!
//! 匹配顺序：
//! 1. 固定路由（精确匹配，内联文本或单个文件）。
//! 2. 静态挂载点（`{prefix}/{filename}`，最长前缀优先）。
//! 3. 兜底重定向（任意方法）。

use std::{path::PathBuf, sync::Arc};

use bytes::Bytes;
use log::debug;

use crate::{
    config::{Config, RouteConfig},
    exception::Exception,
    resolver::StaticRoot,
};

/// 固定路由的内容来源
#[derive(Debug, Clone)]
pub enum FixedSource {
    Body(Bytes),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FixedRoute {
    path: String,
    source: FixedSource,
    content_type: Option<String>,
}

impl FixedRoute {
    pub fn from_config(route: &RouteConfig) -> Result<Self, Exception> {
        let source = match (&route.body, &route.file) {
            (Some(body), None) => FixedSource::Body(Bytes::from(body.clone())),
            (None, Some(file)) => FixedSource::File(file.clone()),
            _ => {
                return Err(Exception::InvalidConfig(format!(
                    "路由{}必须且只能指定body或file之一",
                    route.path
                )))
            }
        };
        Ok(Self {
            path: route.path.clone(),
            source,
            content_type: route.content_type.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &FixedSource {
        &self.source
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// 路由结果
#[derive(Debug)]
pub enum Route<'a> {
    Fixed(&'a FixedRoute),
    Static {
        root: &'a StaticRoot,
        /// 挂载前缀之后的已解码片段，即 `filename` 捕获组
        segment: &'a str,
    },
    Redirect(&'a str),
    Unmatched,
}

#[derive(Debug, Default)]
pub struct Router {
    fixed: Vec<FixedRoute>,
    mounts: Vec<Arc<StaticRoot>>,
    fallback_redirect: Option<String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        let mut router = Self::new();
        for mount in config.mounts() {
            router.add_static(StaticRoot::from_config(mount)?);
        }
        for route in config.routes() {
            router.add_fixed(FixedRoute::from_config(route)?);
        }
        if let Some(url) = config.fallback_redirect() {
            router.set_fallback_redirect(url);
        }
        Ok(router)
    }

    pub fn add_static(&mut self, root: StaticRoot) -> &mut Self {
        debug!("注册静态挂载点{} -> {}", root.prefix(), root.directory().display());
        self.mounts.push(Arc::new(root));
        // 最长前缀优先
        self.mounts
            .sort_by(|a, b| b.prefix().len().cmp(&a.prefix().len()));
        self
    }

    pub fn add_fixed(&mut self, route: FixedRoute) -> &mut Self {
        self.fixed.push(route);
        self
    }

    pub fn set_fallback_redirect(&mut self, url: &str) -> &mut Self {
        self.fallback_redirect = Some(url.to_string());
        self
    }

    /// 按解码后的请求路径匹配。
    ///
    /// 静态片段中的 `..` 越过挂载根时视为逃逸尝试，返回 `Forbidden`。
    pub fn route<'a>(&'a self, path: &'a str) -> Result<Route<'a>, Exception> {
        if let Some(route) = self.fixed.iter().find(|r| r.path == path) {
            return Ok(Route::Fixed(route));
        }

        for root in &self.mounts {
            let rest = match path.strip_prefix(root.prefix()) {
                Some(rest) => rest,
                None => continue,
            };
            let segment = match rest.strip_prefix('/') {
                Some(segment) => segment,
                None => continue,
            };
            if escapes_root(segment) {
                debug!("路径{}试图越过挂载点{}", path, root.prefix());
                return Err(Exception::Forbidden);
            }
            return Ok(Route::Static {
                root: root.as_ref(),
                segment,
            });
        }

        match &self.fallback_redirect {
            Some(url) => Ok(Route::Redirect(url)),
            None => Ok(Route::Unmatched),
        }
    }
}

/// 按词法计算 `..` 是否会越过片段的起点。`\` 也视为分隔符。
pub fn escapes_root(segment: &str) -> bool {
    let mut depth: usize = 0;
    for part in segment.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            _ => depth += 1,
        }
    }
    false
}
