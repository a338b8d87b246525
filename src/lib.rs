//! Resilience and credential layer for HTTP API clients—deterministic retries, safe redirect
//! following, and bearer-token lifecycle composed around a pluggable transport.
//!
//! The crate sits between a generated API-client method and the network stack. Each logical
//! call flows through a [`pipeline::Pipeline`]: the request is stamped with a bearer
//! credential, sent through a [`http::Transport`], resubmitted on transient failures under a
//! [`retry::RetryPolicy`], and re-issued across redirects under a [`redirect::RedirectPolicy`]
//! that enforces a hop limit and a cross-domain header-safety rule.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod error;
pub mod http;
pub mod obs;
pub mod pipeline;
pub mod redirect;
pub mod retry;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::Deserialize;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
