//! squall-core: Hand-rolled HTTP/1.x protocol stack
//!
//! Parses raw request/response byte streams into structured messages,
//! routes requests through a URI-template dispatch tree with content-type
//! negotiation, and produces well-formed responses - without delegating to
//! a platform web framework.
//!
//! The transport (sockets, TLS, thread pools) is an external collaborator:
//! it hands this crate already-received header text and body bytes, and
//! writes back whatever [`Dispatcher::handle`] returns. Everything in here
//! is a pure, synchronous transformation over available data.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod content_type;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod hostname;
pub mod message;
pub mod method;
pub mod query;
pub mod request;
pub mod response;
pub mod status;

// Re-exports
pub use content_type::{AcceptEntry, AcceptTypes, ContentType};
pub use dispatch::{
    handler_fn, DispatchError, Dispatcher, DispatcherConfig, ErrorObserver, Handler, MethodNode,
    RouteNode,
};
pub use error::{BoxError, Error, Result};
pub use headers::{HeaderParse, HeaderStore, TypedValue};
pub use hostname::Hostname;
pub use message::{Body, CancellationSignal, EventTrackingId};
pub use method::Method;
pub use query::QueryString;
pub use request::{HttpVersion, Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, TypedResponse};
pub use status::StatusCode;

// Router re-exports, so consumers need only one crate
pub use squall_router::{RouteMatch, RouteSet, TemplateError, UriTemplate};
