//! A2A client: transport bindings, agent card discovery, streaming
//! mirror, and the transport-agnostic [`Client`] facade.

pub mod a2a_client;
pub mod card_resolver;
pub mod interceptor;
pub mod mirror;
pub mod rest_transport;
pub mod sse;
pub mod transport;

pub use a2a_client::{Client, ClientConfig, EventConsumer, StreamErrorHandler};
pub use card_resolver::CardResolver;
pub use interceptor::{ClientCallContext, ClientCallInterceptor, HeaderInterceptor};
pub use mirror::{ClientEvent, TaskMirror};
pub use rest_transport::RestTransport;
pub use sse::SseStream;
pub use transport::{ClientEventStream, ClientTransport, JsonRpcTransport, TransportConfig};
