//! Route table and dispatcher
//!
//! Per virtual host, a set of compiled URI templates; per template, a
//! method map; per method, content-type handler variants. `handle` is
//! total: every inbound request terminates in a well-formed response,
//! whatever goes wrong on the way.
//!
//! Tables are built at configuration time behind a `RwLock`; the hot
//! path only ever takes the read side, and registration always publishes
//! a complete node, so in-flight lookups never observe partial state.

use crate::content_type::ContentType;
use crate::error::{BoxError, Error, Result};
use crate::hostname::Hostname;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::StatusCode;
use parking_lot::RwLock;
use squall_router::{RouteSet, UriTemplate};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error as ThisError;

/// A bound request handler.
///
/// Handlers run synchronously inside whatever concurrency unit the
/// transport provides; an `Err` becomes a 500 at the dispatch boundary,
/// never a propagated fault.
pub type Handler =
    Arc<dyn Fn(&mut Request) -> std::result::Result<Response, BoxError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut Request) -> std::result::Result<Response, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Synchronous observer invoked after a dispatch failure is classified.
pub type ErrorObserver = Box<dyn Fn(&DispatchError) + Send + Sync>;

/// Per-(route, method) mapping from declared content type to handler.
/// Declaration order is the negotiation tie-break.
pub struct MethodNode {
    variants: Vec<(ContentType, Handler)>,
}

impl MethodNode {
    fn new() -> Self {
        Self {
            variants: Vec::new(),
        }
    }

    /// Declared content types, in declaration order.
    pub fn content_types(&self) -> impl Iterator<Item = &ContentType> {
        self.variants.iter().map(|(ct, _)| ct)
    }

    fn declared(&self) -> Vec<ContentType> {
        self.variants.iter().map(|(ct, _)| ct.clone()).collect()
    }

    fn has(&self, content_type: &ContentType) -> bool {
        self.variants.iter().any(|(ct, _)| ct == content_type)
    }

    fn handler_for(&self, content_type: &ContentType) -> Option<&Handler> {
        self.variants
            .iter()
            .find(|(ct, _)| ct == content_type)
            .map(|(_, handler)| handler)
    }
}

/// Everything registered under one URI template: the per-method handler
/// variants plus optional error pages.
pub struct RouteNode {
    methods: HashMap<Method, MethodNode>,
    error_handler: Option<Handler>,
    status_pages: HashMap<u16, Handler>,
}

impl RouteNode {
    fn new() -> Self {
        Self {
            methods: HashMap::new(),
            error_handler: None,
            status_pages: HashMap::new(),
        }
    }

    /// Methods with at least one registered variant.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.keys()
    }

    fn status_page(&self, status: StatusCode) -> Option<Handler> {
        self.status_pages.get(&status.as_u16()).cloned()
    }
}

/// How a dispatch attempt failed. Each kind maps to a distinct status
/// code family; the classification is also what error observers see.
#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("no route scope for host {host}")]
    NoHostScope { host: Hostname },

    #[error("no route matching {method} {path}")]
    NoRouteMatch { method: Method, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("no acceptable content type for {path}")]
    NotAcceptable { path: String },

    #[error("handler failed: {source}")]
    HandlerFailed {
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// The status code this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoHostScope { .. } => StatusCode::BAD_REQUEST,
            DispatchError::NoRouteMatch { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            DispatchError::HandlerFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Named constants the dispatcher stamps onto fabricated responses,
/// passed at construction instead of living in process-wide state.
#[derive(Clone)]
pub struct DispatcherConfig {
    /// Value of the `Server` header on responses that lack one
    pub server_name: String,
    /// Content type assumed when a registration declares none
    pub default_content_type: ContentType,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            server_name: format!("squall/{}", env!("CARGO_PKG_VERSION")),
            default_content_type: ContentType::text_utf8(),
        }
    }
}

impl DispatcherConfig {
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn default_content_type(mut self, content_type: ContentType) -> Self {
        self.default_content_type = content_type;
        self
    }
}

/// What resolution decided before the lock was released.
enum Resolution {
    Dispatch {
        handler: Handler,
        error_handler: Option<Handler>,
        names: Vec<String>,
        captures: Vec<String>,
        best: ContentType,
    },
    Fail {
        error: DispatchError,
        page: Option<Handler>,
    },
}

/// The route table and dispatch entry point.
pub struct Dispatcher {
    config: DispatcherConfig,
    scopes: RwLock<HashMap<Hostname, RouteSet<RouteNode>>>,
    observers: RwLock<Vec<ErrorObserver>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl Dispatcher {
    /// Create a dispatcher with the given constants.
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            scopes: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register a handler on the wildcard host scope.
    pub fn register(
        &self,
        method: Method,
        template: &str,
        content_types: &[ContentType],
        handler: Handler,
    ) -> Result<()> {
        self.register_on(Hostname::any(), method, template, content_types, handler)
    }

    /// Register a handler on a specific host scope.
    ///
    /// An empty `content_types` slice falls back to the configured
    /// default. Fails with [`Error::RouteConflict`] when the same
    /// (host, template, method, content type) is already bound.
    pub fn register_on(
        &self,
        host: Hostname,
        method: Method,
        template: &str,
        content_types: &[ContentType],
        handler: Handler,
    ) -> Result<()> {
        let default_types;
        let types: &[ContentType] = if content_types.is_empty() {
            default_types = [self.config.default_content_type.clone()];
            &default_types
        } else {
            content_types
        };

        for (i, content_type) in types.iter().enumerate() {
            if types[..i].contains(content_type) {
                return Err(self.conflict(&host, &method, template, content_type));
            }
        }

        // Validate the template before touching the table, so a failed
        // registration cannot leave behind an empty host scope.
        UriTemplate::compile(template).map_err(Error::from)?;

        let mut scopes = self.scopes.write();
        let routes = scopes.entry(host.clone()).or_default();
        let node = routes.get_or_insert_with(template, RouteNode::new)?;

        if let Some(existing) = node.methods.get(&method) {
            for content_type in types {
                if existing.has(content_type) {
                    return Err(self.conflict(&host, &method, template, content_type));
                }
            }
        }

        let method_node = node
            .methods
            .entry(method.clone())
            .or_insert_with(MethodNode::new);
        for content_type in types {
            method_node
                .variants
                .push((content_type.clone(), handler.clone()));
        }

        log::debug!("registered {method} {template} on {host}");
        Ok(())
    }

    fn conflict(
        &self,
        host: &Hostname,
        method: &Method,
        template: &str,
        content_type: &ContentType,
    ) -> Error {
        Error::RouteConflict {
            host: host.to_string(),
            method: method.to_string(),
            template: template.to_string(),
            content_type: content_type.to_string(),
        }
    }

    /// Install a per-route fallback invoked when a handler on this
    /// template fails.
    pub fn set_error_handler(
        &self,
        host: Hostname,
        template: &str,
        handler: Handler,
    ) -> Result<()> {
        let mut scopes = self.scopes.write();
        let routes = scopes.entry(host).or_default();
        let node = routes.get_or_insert_with(template, RouteNode::new)?;
        node.error_handler = Some(handler);
        Ok(())
    }

    /// Install a per-route page for one failure status (404/405/406).
    pub fn set_status_handler(
        &self,
        host: Hostname,
        template: &str,
        status: StatusCode,
        handler: Handler,
    ) -> Result<()> {
        let mut scopes = self.scopes.write();
        let routes = scopes.entry(host).or_default();
        let node = routes.get_or_insert_with(template, RouteNode::new)?;
        node.status_pages.insert(status.as_u16(), handler);
        Ok(())
    }

    /// Subscribe to classified dispatch failures. Observers run
    /// synchronously, after classification, before the response is built.
    pub fn on_error<F>(&self, observer: F)
    where
        F: Fn(&DispatchError) + Send + Sync + 'static,
    {
        self.observers.write().push(Box::new(observer));
    }

    /// Full ingress path: parse raw header text, dispatch, and map any
    /// structural parse failure to its response. Never fails.
    pub fn handle_raw(&self, header: &str, body: crate::message::Body) -> Response {
        match Request::parse_with_body(header, body) {
            Ok(request) => self.handle(request),
            Err(error) => {
                log::debug!("structural parse failure: {error}");
                let mut response = Response::from_parse_error(&error);
                self.stamp(&mut response);
                response
            }
        }
    }

    /// Dispatch a parsed request. Total: every failure branch maps to a
    /// response, and handler faults never cross this boundary.
    pub fn handle(&self, mut request: Request) -> Response {
        let host = request.host();
        let accept = request.accept();
        let method = request.method.clone();
        let path = request.path.clone();

        let resolution = {
            let scopes = self.scopes.read();

            let routes = host
                .fallback_chain()
                .iter()
                .find_map(|candidate| scopes.get(candidate));

            match routes {
                None => Resolution::Fail {
                    error: DispatchError::NoHostScope { host: host.clone() },
                    page: None,
                },
                Some(routes) => match routes.find(&path) {
                    None => Resolution::Fail {
                        error: DispatchError::NoRouteMatch {
                            method: method.clone(),
                            path: path.clone(),
                        },
                        page: None,
                    },
                    Some(matched) => {
                        let node = matched.value;
                        match node.methods.get(&method) {
                            None if node.methods.is_empty() => Resolution::Fail {
                                // A template with no methods routes like
                                // an unregistered one.
                                page: node.status_page(StatusCode::NOT_FOUND),
                                error: DispatchError::NoRouteMatch {
                                    method: method.clone(),
                                    path: path.clone(),
                                },
                            },
                            None => {
                                let mut allowed: Vec<Method> =
                                    node.methods.keys().cloned().collect();
                                allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                                Resolution::Fail {
                                    page: node.status_page(StatusCode::METHOD_NOT_ALLOWED),
                                    error: DispatchError::MethodNotAllowed {
                                        method: method.clone(),
                                        path: path.clone(),
                                        allowed,
                                    },
                                }
                            }
                            Some(method_node) => {
                                match accept.best_match(&method_node.declared()) {
                                    None => Resolution::Fail {
                                        page: node.status_page(StatusCode::NOT_ACCEPTABLE),
                                        error: DispatchError::NotAcceptable { path: path.clone() },
                                    },
                                    Some(best) => match method_node.handler_for(&best) {
                                        Some(handler) => Resolution::Dispatch {
                                            handler: handler.clone(),
                                            error_handler: node.error_handler.clone(),
                                            names: matched.template.param_names().to_vec(),
                                            captures: matched.captures,
                                            best,
                                        },
                                        None => Resolution::Fail {
                                            page: node.status_page(StatusCode::NOT_ACCEPTABLE),
                                            error: DispatchError::NotAcceptable {
                                                path: path.clone(),
                                            },
                                        },
                                    },
                                }
                            }
                        }
                    }
                },
            }
        };

        match resolution {
            Resolution::Fail { error, page } => self.finish_error(request, error, page),
            Resolution::Dispatch {
                handler,
                error_handler,
                names,
                captures,
                best,
            } => {
                request.uri_params = captures;
                request.uri_param_names = names;
                request.best_accept = Some(best);

                match catch_unwind(AssertUnwindSafe(|| handler(&mut request))) {
                    Ok(Ok(mut response)) => {
                        self.stamp(&mut response);
                        response
                    }
                    Ok(Err(source)) => self.handler_failed(request, source, error_handler),
                    Err(payload) => {
                        self.handler_failed(request, panic_error(payload), error_handler)
                    }
                }
            }
        }
    }

    fn handler_failed(
        &self,
        mut request: Request,
        source: BoxError,
        error_handler: Option<Handler>,
    ) -> Response {
        let error = DispatchError::HandlerFailed { source };
        log::warn!("{} {}: {error}", request.method, request.path);
        self.notify(&error);

        if let Some(fallback) = error_handler {
            if let Ok(Ok(mut response)) = catch_unwind(AssertUnwindSafe(|| fallback(&mut request)))
            {
                self.stamp(&mut response);
                return response;
            }
        }

        let mut response = self.failure_response(&request, &error);
        self.stamp(&mut response);
        response
    }

    fn finish_error(
        &self,
        mut request: Request,
        error: DispatchError,
        page: Option<Handler>,
    ) -> Response {
        log::debug!("{} {}: {error}", request.method, request.path);
        self.notify(&error);

        if let Some(page) = page {
            if let Ok(Ok(mut response)) = catch_unwind(AssertUnwindSafe(|| page(&mut request))) {
                self.stamp(&mut response);
                return response;
            }
        }

        let mut response = self.failure_response(&request, &error);
        self.stamp(&mut response);
        response
    }

    fn failure_response(&self, request: &Request, error: &DispatchError) -> Response {
        let mut response = Response::for_request(request, error.status());
        response
            .headers
            .set("Content-Type", ContentType::text_utf8().to_string());

        match error {
            DispatchError::MethodNotAllowed { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                response.headers.set("Allow", allow);
                response.body = error.to_string().into();
            }
            // The captured error stays with the observers; the wire gets
            // a generic message.
            DispatchError::HandlerFailed { .. } => {
                response.body = "Internal Server Error".into();
            }
            _ => {
                response.body = error.to_string().into();
            }
        }

        response
    }

    fn stamp(&self, response: &mut Response) {
        if !response.headers.contains("Server") {
            response
                .headers
                .set("Server", self.config.server_name.clone());
        }
    }

    fn notify(&self, error: &DispatchError) {
        for observer in self.observers.read().iter() {
            observer(error);
        }
    }
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> BoxError {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).into()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone().into()
    } else {
        "handler panicked".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Body;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn parse(header: &str) -> Request {
        Request::parse(header).unwrap()
    }

    fn echo_params() -> Handler {
        handler_fn(|req| Ok(Response::text(req.uri_params.join(","))))
    }

    #[test]
    fn test_get_with_param_capture_and_default_accept() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/users/{id}",
                &[ContentType::json_utf8()],
                echo_params(),
            )
            .unwrap();

        let response =
            dispatcher.handle(parse("GET /users/42 HTTP/1.1\r\nHost: api.test\r\n\r\n"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_string().as_deref(), Some("42"));
    }

    #[test]
    fn test_best_accept_populated_on_request() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/users/{id}",
                &[ContentType::json_utf8()],
                handler_fn(|req| {
                    let best = req.best_accept.clone().map(|ct| ct.to_string());
                    Ok(Response::text(best.unwrap_or_default()))
                }),
            )
            .unwrap();

        let response =
            dispatcher.handle(parse("GET /users/1 HTTP/1.1\r\nHost: api.test\r\n\r\n"));
        assert_eq!(
            response.body_string().as_deref(),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn test_method_not_allowed_with_allow_header() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/users/{id}",
                &[ContentType::json_utf8()],
                echo_params(),
            )
            .unwrap();

        let response =
            dispatcher.handle(parse("POST /users/42 HTTP/1.1\r\nHost: api.test\r\n\r\n"));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("Allow"), Some("GET"));
    }

    #[test]
    fn test_greedy_tail_capture() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/files/{path}",
                &[ContentType::octet_stream()],
                echo_params(),
            )
            .unwrap();

        let response =
            dispatcher.handle(parse("GET /files/a/b/c.txt HTTP/1.1\r\nHost: files.test\r\n\r\n"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_string().as_deref(), Some("a/b/c.txt"));
    }

    #[test]
    fn test_fixed_template_beats_param_template() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(Method::Get, "/a/{p}", &[], handler_fn(|_| Ok(Response::text("param"))))
            .unwrap();
        dispatcher
            .register(Method::Get, "/a/fixed", &[], handler_fn(|_| Ok(Response::text("fixed"))))
            .unwrap();

        let response = dispatcher.handle(parse("GET /a/fixed HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.body_string().as_deref(), Some("fixed"));

        let response = dispatcher.handle(parse("GET /a/other HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.body_string().as_deref(), Some("param"));
    }

    #[test]
    fn test_missing_host_is_rejected_before_routing() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();

        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/users/{id}",
                &[],
                handler_fn(move |_| {
                    flag.store(true, Ordering::SeqCst);
                    Ok(Response::ok())
                }),
            )
            .unwrap();

        let response = dispatcher.handle_raw("GET /users/42 HTTP/1.1\r\n\r\n", Body::Empty);
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_version_not_supported_maps_to_505() {
        let dispatcher = Dispatcher::default();
        let response = dispatcher.handle_raw("GET / HTTP/2.0\r\nHost: a\r\n\r\n", Body::Empty);
        assert_eq!(response.status, StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    #[test]
    fn test_no_host_scope_when_no_wildcard_registered() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register_on(
                Hostname::parse("api.test").unwrap(),
                Method::Get,
                "/ping",
                &[],
                handler_fn(|_| Ok(Response::ok())),
            )
            .unwrap();

        let response = dispatcher.handle(parse("GET /ping HTTP/1.1\r\nHost: other.test\r\n\r\n"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = dispatcher.handle(parse("GET /ping HTTP/1.1\r\nHost: api.test\r\n\r\n"));
        assert_eq!(response.status, StatusCode::OK);
    }

    #[test]
    fn test_host_scope_specificity() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register_on(
                Hostname::parse("api.test:80").unwrap(),
                Method::Get,
                "/who",
                &[],
                handler_fn(|_| Ok(Response::text("specific"))),
            )
            .unwrap();
        dispatcher
            .register(Method::Get, "/who", &[], handler_fn(|_| Ok(Response::text("wildcard"))))
            .unwrap();

        let response = dispatcher.handle(parse("GET /who HTTP/1.1\r\nHost: api.test\r\n\r\n"));
        assert_eq!(response.body_string().as_deref(), Some("specific"));

        let response = dispatcher.handle(parse("GET /who HTTP/1.1\r\nHost: other.test\r\n\r\n"));
        assert_eq!(response.body_string().as_deref(), Some("wildcard"));
    }

    #[test]
    fn test_not_acceptable_is_406_not_404() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/data",
                &[ContentType::json_utf8()],
                echo_params(),
            )
            .unwrap();

        let response = dispatcher.handle(parse(
            "GET /data HTTP/1.1\r\nHost: a\r\nAccept: text/html\r\n\r\n",
        ));
        assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_negotiation_selects_higher_quality_variant() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/report",
                &[ContentType::json_utf8()],
                handler_fn(|_| Ok(Response::text("json"))),
            )
            .unwrap();
        dispatcher
            .register(
                Method::Get,
                "/report",
                &[ContentType::xml_utf8()],
                handler_fn(|_| Ok(Response::text("xml"))),
            )
            .unwrap();

        let response = dispatcher.handle(parse(
            "GET /report HTTP/1.1\r\nHost: a\r\nAccept: text/xml, application/json;q=0.5\r\n\r\n",
        ));
        assert_eq!(response.body_string().as_deref(), Some("xml"));

        // Absent Accept header selects the first declared variant.
        let response = dispatcher.handle(parse("GET /report HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.body_string().as_deref(), Some("json"));
    }

    #[test]
    fn test_handler_error_becomes_500_and_notifies_observers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let dispatcher = Dispatcher::default();
        dispatcher.on_error(move |error| sink.lock().push(error.to_string()));
        dispatcher
            .register(
                Method::Get,
                "/boom",
                &[],
                handler_fn(|_| Err("backend unavailable".into())),
            )
            .unwrap();

        let response = dispatcher.handle(parse("GET /boom HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body_string().as_deref(), Some("Internal Server Error"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("backend unavailable"));
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(
                Method::Get,
                "/panic",
                &[],
                handler_fn(|_| panic!("unexpected state")),
            )
            .unwrap();

        let response = dispatcher.handle(parse("GET /panic HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_route_error_handler_overrides_500() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(Method::Get, "/boom", &[], handler_fn(|_| Err("x".into())))
            .unwrap();
        dispatcher
            .set_error_handler(
                Hostname::any(),
                "/boom",
                handler_fn(|_| Ok(Response::internal_error("custom-error"))),
            )
            .unwrap();

        let response = dispatcher.handle(parse("GET /boom HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body_string().as_deref(), Some("custom-error"));
    }

    #[test]
    fn test_status_page_override() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(Method::Get, "/thing", &[], echo_params())
            .unwrap();
        dispatcher
            .set_status_handler(
                Hostname::any(),
                "/thing",
                StatusCode::METHOD_NOT_ALLOWED,
                handler_fn(|_| {
                    Ok(crate::response::ResponseBuilder::new(StatusCode::METHOD_NOT_ALLOWED)
                        .body("custom 405 page")
                        .build())
                }),
            )
            .unwrap();

        let response = dispatcher.handle(parse("POST /thing HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.body_string().as_deref(), Some("custom 405 page"));
    }

    #[test]
    fn test_route_conflict_detected() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .register(Method::Get, "/dup", &[ContentType::json_utf8()], echo_params())
            .unwrap();

        let err = dispatcher
            .register(Method::Get, "/dup", &[ContentType::json_utf8()], echo_params())
            .unwrap_err();
        assert!(matches!(err, Error::RouteConflict { .. }));

        // Same template, different method: no conflict.
        dispatcher
            .register(Method::Post, "/dup", &[ContentType::json_utf8()], echo_params())
            .unwrap();
    }

    #[test]
    fn test_empty_content_types_use_configured_default() {
        let config = DispatcherConfig::default().default_content_type(ContentType::json_utf8());
        let dispatcher = Dispatcher::new(config);
        dispatcher
            .register(Method::Get, "/d", &[], echo_params())
            .unwrap();

        let response = dispatcher.handle(parse(
            "GET /d HTTP/1.1\r\nHost: a\r\nAccept: application/json\r\n\r\n",
        ));
        assert_eq!(response.status, StatusCode::OK);

        let response = dispatcher.handle(parse(
            "GET /d HTTP/1.1\r\nHost: a\r\nAccept: text/plain\r\n\r\n",
        ));
        assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_server_header_stamped() {
        let dispatcher =
            Dispatcher::new(DispatcherConfig::default().server_name("unit-test/1"));
        dispatcher
            .register(Method::Get, "/s", &[], echo_params())
            .unwrap();

        let response = dispatcher.handle(parse("GET /s HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.header("Server"), Some("unit-test/1"));

        let response = dispatcher.handle(parse("GET /missing HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.header("Server"), Some("unit-test/1"));
    }

    #[test]
    fn test_template_with_no_methods_routes_as_miss() {
        let dispatcher = Dispatcher::default();
        dispatcher
            .set_status_handler(
                Hostname::any(),
                "/legacy",
                StatusCode::NOT_FOUND,
                handler_fn(|_| {
                    Ok(crate::response::ResponseBuilder::new(StatusCode::NOT_FOUND)
                        .body("gone away")
                        .build())
                }),
            )
            .unwrap();

        let response = dispatcher.handle(parse("GET /legacy HTTP/1.1\r\nHost: a\r\n\r\n"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body_string().as_deref(), Some("gone away"));
    }

    #[test]
    fn test_response_correlated_with_request() {
        let dispatcher = Dispatcher::default();
        let request = parse("GET /nowhere HTTP/1.1\r\nHost: a\r\n\r\n");
        let tracking = request.tracking_id.clone();

        let response = dispatcher.handle(request);
        assert_eq!(response.tracking_id, Some(tracking));
        assert_eq!(response.request_line.as_deref(), Some("GET /nowhere HTTP/1.1"));
    }
}
