// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::exception::Exception;
use crate::param::DEFAULT_CHUNK_SIZE;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default)]
    debug: bool,
    #[serde(default = "default_ignored_status_codes")]
    ignored_status_codes: Vec<u16>,
    #[serde(default = "default_stylesheet")]
    stylesheet: String,
    #[serde(default = "default_font_url")]
    font_url: String,
    #[serde(default)]
    fallback_redirect: Option<String>,
    #[serde(default)]
    mounts: Vec<MountConfig>,
    #[serde(default)]
    routes: Vec<RouteConfig>,
}

/// 一个静态资源挂载点
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MountConfig {
    pub prefix: String,
    pub root: PathBuf,
    #[serde(default)]
    pub show_index: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// 固定路由：内联文本或单个文件
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouteConfig {
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub content_type: Option<String>,
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_ignored_status_codes() -> Vec<u16> {
    vec![400]
}

fn default_stylesheet() -> String {
    "/static/style.css".to_string()
}

fn default_font_url() -> String {
    "/static/font.ttf".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            local: default_local(),
            worker_threads: 0,
            debug: false,
            ignored_status_codes: default_ignored_status_codes(),
            stylesheet: default_stylesheet(),
            font_url: default_font_url(),
            fallback_redirect: None,
            mounts: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, Exception> {
        let filename = filename.as_ref();
        let str_val = fs::read_to_string(filename).map_err(|e| {
            Exception::InvalidConfig(format!("无法读取配置文件{}：{}", filename.display(), e))
        })?;
        let config = Self::from_str(&str_val)?;
        info!("配置文件{}已载入", filename.display());
        Ok(config)
    }

    pub fn from_str(s: &str) -> Result<Self, Exception> {
        let mut raw_config: Config =
            toml::from_str(s).map_err(|e| Exception::InvalidConfig(e.to_string()))?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        raw_config.validate()?;
        Ok(raw_config)
    }

    fn validate(&self) -> Result<(), Exception> {
        for mount in &self.mounts {
            if !mount.prefix.starts_with('/') {
                return Err(Exception::InvalidConfig(format!(
                    "挂载前缀必须以'/'开头：{}",
                    mount.prefix
                )));
            }
            if mount.chunk_size == 0 {
                return Err(Exception::InvalidConfig(format!(
                    "挂载点{}的chunk_size不能为0",
                    mount.prefix
                )));
            }
            if mount.follow_symlinks {
                warn!("挂载点{}允许跟随符号链接，将不做包含性检查", mount.prefix);
            }
        }
        for route in &self.routes {
            if route.body.is_some() == route.file.is_some() {
                return Err(Exception::InvalidConfig(format!(
                    "路由{}必须且只能指定body或file之一",
                    route.path
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn ignored_status_codes(&self) -> &[u16] {
        &self.ignored_status_codes
    }

    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn font_url(&self) -> &str {
        &self.font_url
    }

    pub fn fallback_redirect(&self) -> Option<&str> {
        self.fallback_redirect.as_deref()
    }

    pub fn mounts(&self) -> &[MountConfig] {
        &self.mounts
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }
}
