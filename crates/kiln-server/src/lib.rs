//! Development server for kiln.
//!
//! Serves the app directory, re-runs pipeline stages when their sources change
//! and tells connected browsers to reload over a WebSocket.

pub mod routes;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use routes::{WatchAction, WatchRoutes};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{LiveReloadHub, LiveReloadMessage};
