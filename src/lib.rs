// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod access;
pub mod config;
pub mod connection;
pub mod exception;
pub mod handler;
pub mod listing;
pub mod param;
pub mod request;
pub mod resolver;
pub mod responder;
pub mod response;
pub mod router;
pub mod server;

pub use access::{AccessEntry, AccessLog, LogAccessLogger};
pub use config::Config;
pub use connection::Connection;
pub use exception::Exception;
pub use listing::ListingAssets;
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use resolver::{resolve, ResolvedPath, StaticRoot};
pub use responder::{ErrorContext, ErrorResponder};
pub use response::Response;
pub use router::{Route, Router};
pub use server::App;
