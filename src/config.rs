//! Configuration utilities (ports, asset paths, env vars)

use std::path::PathBuf;
use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
};

/// Socket address to bind the server to.
///
/// Reads the `PORT` env var or defaults to 8080, binds to 0.0.0.0.
pub fn server_addr() -> SocketAddr {
    let port = env::var("PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8080);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Directory the stylesheet and room script are served from.
///
/// `STATIC_DIR` overrides the default `./static` (crate root in dev,
/// working directory in a container).
pub fn static_dir() -> PathBuf {
    env::var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./static"))
}
