//! Builders for agent cards, servers, and clients.

use crate::types::*;

/// Builder for [`AgentCard`] with routing-relevant defaults.
///
/// # Example
///
/// ```
/// use a2a_runtime::builders::AgentCardBuilder;
///
/// let card = AgentCardBuilder::new("Echo Agent", "Echoes messages", "1.0.0")
///     .with_url("http://localhost:7420/a2a")
///     .with_streaming(true)
///     .with_skill("echo", "Echo", "Echo text back", vec!["chat".to_string()])
///     .build();
/// assert_eq!(card.capabilities.streaming, Some(true));
/// ```
#[derive(Debug, Clone)]
pub struct AgentCardBuilder {
    name: String,
    description: String,
    version: String,
    url: String,
    capabilities: AgentCapabilities,
    supported_interfaces: Vec<AgentInterface>,
    provider: Option<AgentProvider>,
    documentation_url: Option<String>,
    default_input_modes: Vec<String>,
    default_output_modes: Vec<String>,
    skills: Vec<AgentSkill>,
    preferred_transport: Option<String>,
    protocol_version: Option<String>,
    supports_authenticated_extended_card: Option<bool>,
}

impl AgentCardBuilder {
    /// Start a card with the required identity fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            version: version.into(),
            url: String::new(),
            capabilities: AgentCapabilities::default(),
            supported_interfaces: Vec::new(),
            provider: None,
            documentation_url: None,
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            skills: Vec::new(),
            preferred_transport: None,
            protocol_version: Some(crate::utils::constants::DEFAULT_PROTOCOL_VERSION.to_string()),
            supports_authenticated_extended_card: None,
        }
    }

    /// Set the primary endpoint URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Declare a JSON-RPC interface (also sets the primary URL when
    /// unset).
    pub fn with_jsonrpc_interface(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.supported_interfaces.push(AgentInterface {
            url: url.clone(),
            transport: "JSONRPC".to_string(),
            protocol_version: self.protocol_version.clone(),
        });
        if self.url.is_empty() {
            self.url = url;
        }
        self
    }

    /// Declare a REST (HTTP+JSON) interface.
    pub fn with_rest_interface(mut self, url: impl Into<String>) -> Self {
        self.supported_interfaces.push(AgentInterface {
            url: url.into(),
            transport: "HTTP+JSON".to_string(),
            protocol_version: self.protocol_version.clone(),
        });
        self
    }

    /// Declare a gRPC interface.
    pub fn with_grpc_interface(mut self, url: impl Into<String>) -> Self {
        self.supported_interfaces.push(AgentInterface {
            url: url.into(),
            transport: "GRPC".to_string(),
            protocol_version: self.protocol_version.clone(),
        });
        self
    }

    /// Enable or disable streaming support.
    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.capabilities.streaming = Some(enabled);
        self
    }

    /// Enable or disable push notification support.
    pub fn with_push_notifications(mut self, enabled: bool) -> Self {
        self.capabilities.push_notifications = Some(enabled);
        self
    }

    /// Declare a protocol extension.
    pub fn with_extension(
        mut self,
        uri: impl Into<String>,
        description: Option<String>,
        required: bool,
    ) -> Self {
        self.capabilities
            .extensions
            .get_or_insert_with(Vec::new)
            .push(AgentExtension {
                uri: uri.into(),
                description,
                required: Some(required),
                params: None,
            });
        self
    }

    /// Add a skill.
    pub fn with_skill(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        self.skills.push(AgentSkill {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags,
            examples: None,
            input_modes: None,
            output_modes: None,
        });
        self
    }

    /// Set provider information.
    pub fn with_provider(
        mut self,
        organization: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        self.provider = Some(AgentProvider {
            organization: organization.into(),
            url: url.into(),
        });
        self
    }

    /// Set the documentation URL.
    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = Some(url.into());
        self
    }

    /// Set the preferred transport.
    pub fn with_preferred_transport(mut self, transport: impl Into<String>) -> Self {
        self.preferred_transport = Some(transport.into());
        self
    }

    /// Advertise the authenticated extended card.
    pub fn with_authenticated_extended_card(mut self, supported: bool) -> Self {
        self.supports_authenticated_extended_card = Some(supported);
        self
    }

    /// Finish the card.
    pub fn build(self) -> AgentCard {
        AgentCard {
            name: self.name,
            description: self.description,
            version: self.version,
            url: self.url,
            capabilities: self.capabilities,
            supported_interfaces: self.supported_interfaces,
            provider: self.provider,
            documentation_url: self.documentation_url,
            default_input_modes: self.default_input_modes,
            default_output_modes: self.default_output_modes,
            skills: self.skills,
            preferred_transport: self.preferred_transport,
            protocol_version: self.protocol_version,
            supports_authenticated_extended_card: self.supports_authenticated_extended_card,
        }
    }
}

#[cfg(feature = "server")]
pub use server_builder::{A2AServer, ServerBuilder};

#[cfg(feature = "server")]
mod server_builder {
    use std::sync::Arc;

    use crate::server::{
        AgentExecutor, DefaultRequestHandler, EventBusProcessor, HttpPushSender,
        InMemoryPushNotificationConfigStore, InMemoryQueueManager, InMemoryTaskStore,
        MainEventBus, PushNotificationConfigStore, RequestHandler, TaskStore,
        DEFAULT_BUS_CAPACITY, DEFAULT_QUEUE_CAPACITY,
    };
    use crate::types::AgentCard;

    /// Wires the whole server pipeline: bus, processor, queue manager,
    /// request handler, and the HTTP routers.
    pub struct ServerBuilder {
        executor: Arc<dyn AgentExecutor>,
        agent_card: AgentCard,
        task_store: Option<Arc<dyn TaskStore>>,
        push_config_store: Option<Arc<dyn PushNotificationConfigStore>>,
        extended_card: Option<AgentCard>,
        queue_capacity: usize,
        bus_capacity: usize,
    }

    impl ServerBuilder {
        /// Start from the two mandatory pieces: agent logic and card.
        pub fn new(executor: Arc<dyn AgentExecutor>, agent_card: AgentCard) -> Self {
            Self {
                executor,
                agent_card,
                task_store: None,
                push_config_store: None,
                extended_card: None,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                bus_capacity: DEFAULT_BUS_CAPACITY,
            }
        }

        /// Use a custom task store (default: in-memory).
        pub fn with_task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
            self.task_store = Some(store);
            self
        }

        /// Use a custom push config store. When the card advertises push
        /// notifications and no store is given, an in-memory one is used.
        pub fn with_push_config_store(
            mut self,
            store: Arc<dyn PushNotificationConfigStore>,
        ) -> Self {
            self.push_config_store = Some(store);
            self
        }

        /// Install an authenticated extended card.
        pub fn with_extended_card(mut self, card: AgentCard) -> Self {
            self.extended_card = Some(card);
            self
        }

        /// Per-task queue capacity (backpressure bound).
        pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
            self.queue_capacity = capacity;
            self
        }

        /// Central bus capacity.
        pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
            self.bus_capacity = capacity;
            self
        }

        /// Construct the pipeline and spawn its processor.
        pub fn build(self) -> A2AServer {
            let task_store = self
                .task_store
                .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()));

            let push_enabled =
                self.agent_card.capabilities.push_notifications == Some(true);
            let push_config_store = if push_enabled {
                Some(self.push_config_store.unwrap_or_else(|| {
                    Arc::new(InMemoryPushNotificationConfigStore::new())
                }))
            } else {
                self.push_config_store
            };

            let (bus, bus_rx) = MainEventBus::channel(self.bus_capacity);

            let mut processor = EventBusProcessor::new(Arc::clone(&task_store));
            if let Some(ref store) = push_config_store {
                processor = processor
                    .with_push_sender(Arc::new(HttpPushSender::new(Arc::clone(store))));
            }
            let finalized = processor.finalized_tasks();
            let processor_handle = processor.spawn(bus_rx);

            let queue_manager = Arc::new(
                InMemoryQueueManager::new(bus.clone())
                    .with_capacity(self.queue_capacity)
                    .with_state_provider(finalized),
            );

            let mut handler = DefaultRequestHandler::new(
                self.executor,
                Arc::clone(&task_store),
                queue_manager,
                self.agent_card.clone(),
            );
            if let Some(store) = push_config_store {
                handler = handler.with_push_config_store(store);
            }
            if let Some(card) = self.extended_card {
                handler = handler.with_extended_card(card);
            }

            A2AServer {
                handler: Arc::new(handler),
                agent_card: self.agent_card,
                bus,
                processor_handle,
            }
        }
    }

    /// A fully wired server: handler, card, bus, and running processor.
    pub struct A2AServer {
        handler: Arc<DefaultRequestHandler>,
        agent_card: AgentCard,
        bus: MainEventBus,
        processor_handle: tokio::task::JoinHandle<()>,
    }

    impl A2AServer {
        /// The request handler, for custom transport wiring.
        pub fn handler(&self) -> Arc<dyn RequestHandler> {
            Arc::clone(&self.handler) as Arc<dyn RequestHandler>
        }

        /// The agent card this server advertises.
        pub fn agent_card(&self) -> &AgentCard {
            &self.agent_card
        }

        /// The process-wide event bus (for replication hooks or direct
        /// enqueues in tests).
        pub fn bus(&self) -> MainEventBus {
            self.bus.clone()
        }

        /// An axum router serving both HTTP bindings: JSON-RPC at `/a2a`
        /// plus the well-known card routes, and REST under `/v1`.
        pub fn into_router(self) -> axum::Router {
            let handler = self.handler();
            let jsonrpc = crate::server::jsonrpc_router(
                Arc::clone(&handler),
                self.agent_card.clone(),
            );
            let rest = crate::server::rest_router(handler, self.agent_card);
            // Dropping the join handle detaches the processor; it keeps
            // running for the process lifetime.
            drop(self.processor_handle);
            jsonrpc.merge(rest)
        }

        /// Stop the processor. Pending bus items are dropped.
        pub fn shutdown(self) {
            self.processor_handle.abort();
        }
    }
}

#[cfg(feature = "client")]
pub use client_builder::ClientBuilder;

#[cfg(feature = "client")]
mod client_builder {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::client::{
        Client, ClientCallInterceptor, ClientConfig, ClientTransport, EventConsumer,
        JsonRpcTransport, RestTransport, StreamErrorHandler, TransportConfig,
    };
    use crate::error::{A2AError, A2AResult};
    use crate::types::AgentCard;

    enum Endpoint {
        JsonRpc(String),
        Rest(String),
        Custom(Box<dyn ClientTransport>),
    }

    /// Builder for [`Client`].
    pub struct ClientBuilder {
        endpoint: Option<Endpoint>,
        card: Option<AgentCard>,
        config: ClientConfig,
        timeout: Option<Duration>,
        interceptors: Vec<Arc<dyn ClientCallInterceptor>>,
        consumers: Vec<EventConsumer>,
        error_handler: Option<StreamErrorHandler>,
    }

    impl Default for ClientBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ClientBuilder {
        /// Empty builder.
        pub fn new() -> Self {
            Self {
                endpoint: None,
                card: None,
                config: ClientConfig::default(),
                timeout: None,
                interceptors: Vec::new(),
                consumers: Vec::new(),
                error_handler: None,
            }
        }

        /// Talk JSON-RPC to the given endpoint.
        pub fn jsonrpc(mut self, url: impl Into<String>) -> Self {
            self.endpoint = Some(Endpoint::JsonRpc(url.into()));
            self
        }

        /// Talk REST to the given base URL.
        pub fn rest(mut self, base_url: impl Into<String>) -> Self {
            self.endpoint = Some(Endpoint::Rest(base_url.into()));
            self
        }

        /// Use a custom transport.
        pub fn transport(mut self, transport: Box<dyn ClientTransport>) -> Self {
            self.endpoint = Some(Endpoint::Custom(transport));
            self
        }

        /// Provide a pre-resolved agent card.
        pub fn card(mut self, card: AgentCard) -> Self {
            self.card = Some(card);
            self
        }

        /// Set the client configuration.
        pub fn config(mut self, config: ClientConfig) -> Self {
            self.config = config;
            self
        }

        /// Set the unary request timeout.
        pub fn timeout(mut self, timeout: Duration) -> Self {
            self.timeout = Some(timeout);
            self
        }

        /// Append a call interceptor.
        pub fn interceptor(mut self, interceptor: Arc<dyn ClientCallInterceptor>) -> Self {
            self.interceptors.push(interceptor);
            self
        }

        /// Append a stream event consumer.
        pub fn consumer(mut self, consumer: EventConsumer) -> Self {
            self.consumers.push(consumer);
            self
        }

        /// Set the stream error handler.
        pub fn error_handler(mut self, handler: StreamErrorHandler) -> Self {
            self.error_handler = Some(handler);
            self
        }

        /// Build the client.
        pub fn build(self) -> A2AResult<Client> {
            let transport_config = TransportConfig {
                timeout: self.timeout,
                call_context: Default::default(),
                interceptors: self.interceptors,
            };

            let transport: Box<dyn ClientTransport> = match self.endpoint {
                Some(Endpoint::JsonRpc(url)) => {
                    Box::new(JsonRpcTransport::with_config(url, transport_config))
                }
                Some(Endpoint::Rest(url)) => {
                    Box::new(RestTransport::with_config(url, transport_config))
                }
                Some(Endpoint::Custom(transport)) => transport,
                None => {
                    return Err(A2AError::invalid_request(
                        "client builder needs an endpoint or transport",
                    ))
                }
            };

            let mut client = Client::with_transport(transport).with_config(self.config);
            if let Some(card) = self.card {
                client = client.with_card(card);
            }
            for consumer in self.consumers {
                client.add_consumer(consumer);
            }
            if let Some(handler) = self.error_handler {
                client.set_error_handler(handler);
            }
            Ok(client)
        }
    }
}
