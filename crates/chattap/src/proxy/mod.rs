//! Transparent forwarding proxy with exchange capture

mod error;
mod network;
mod relay;
mod server;
mod streaming;
mod upstream;

pub use error::{ProxyError, handle_capture_error};
pub use network::{HostClass, TlsPolicy, classify_host, is_private_ip};
pub use relay::{CapturePolicy, InboundRequest, RelayEngine};
pub use server::{AppState, ProxyServer, create_router};
pub use streaming::{BufferHandle, ClientStream, StreamOutcome, TeeResult, error_chunk, tee_stream};
pub use upstream::{
    UpstreamFlavor, UpstreamTarget, forward_request_headers, relay_response_headers,
};
