//! Host-facing API: wire types and the stream controller seam

pub mod controller;
pub mod types;

pub use controller::StreamController;
pub use types::{
    AddressInfo, AddressKind, EndpointRequest, EndpointResponse, PrepareStreamRequest,
    PrepareStreamResponse, StreamRequest, StreamRequestKind,
};
