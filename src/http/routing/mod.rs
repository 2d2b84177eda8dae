use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

pub mod types;

use types::{BoxFuture, Handler, HandlerResult, NotFound, Pattern, Route, RouteRequest};

use crate::http::http_core::types::{HttpMethod, Params, Reply};
use crate::http::static_files::types::StaticMount;
use crate::http::static_files::StaticResolver;

fn into_handler<F, Fut>(handler: F) -> Handler
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |req: RouteRequest| -> BoxFuture<'static, HandlerResult> { Box::pin(handler(req)) })
}

/// Route table, static mounts and an optional catch-all.
///
/// Built once before the server starts and shared read-only afterwards.
pub struct Router {
    routes: Vec<Route>,
    statics: StaticResolver,
    fallback: Option<Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Router::new()
    }
}

impl Router {
    pub fn new() -> Router {
        Router {
            routes: Vec::new(),
            statics: StaticResolver::new("index.html"),
            fallback: None,
        }
    }

    /// Registers `handler` for `method` and `pattern`. Registering the same
    /// pair again replaces the earlier handler.
    pub fn route<F, Fut>(&mut self, method: HttpMethod, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = into_handler(handler);
        match self
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern.as_str() == pattern)
        {
            Some(existing) => existing.handler = handler,
            None => self.routes.push(Route {
                method: method,
                pattern: Pattern::parse(pattern),
                handler: handler,
            }),
        }
        self
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(HttpMethod::GET, pattern, handler)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(HttpMethod::POST, pattern, handler)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(HttpMethod::PUT, pattern, handler)
    }

    pub fn patch<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(HttpMethod::PATCH, pattern, handler)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(HttpMethod::DELETE, pattern, handler)
    }

    /// Serves files from `directory` under `url_prefix`.
    pub fn static_dir(&mut self, url_prefix: &str, directory: impl Into<PathBuf>) -> &mut Router {
        self.statics.mount(StaticMount::new(url_prefix, directory));
        self
    }

    pub fn index_file(&mut self, index_file: &str) -> &mut Router {
        self.statics.set_index_file(index_file);
        self
    }

    /// Called when neither a route nor a static file matches, e.g. to hand
    /// a single-page app its `index.html` for client-side routes.
    pub fn fallback<F, Fut>(&mut self, handler: F) -> &mut Router
    where
        F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.fallback = Some(into_handler(handler));
        self
    }

    pub fn statics(&self) -> &StaticResolver {
        &self.statics
    }

    /// First route registered for `method` whose pattern fits `path`.
    pub fn match_route(&self, method: HttpMethod, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .filter(|r| r.method == method)
            .find_map(|r| r.pattern.matches(path).map(|params| (r, params)))
    }

    /// Route table, then static files, then the fallback, then 404.
    pub async fn dispatch(&self, mut req: RouteRequest) -> HandlerResult {
        if let Some(method) = req.method {
            if let Some((route, params)) = self.match_route(method, &req.path) {
                tracing::trace!(pattern = route.pattern.as_str(), "route matched");
                req.params = params;
                return (route.handler)(req).await;
            }
        }

        let miss = if req.method == Some(HttpMethod::GET) {
            if let Some(reply) = self.statics.resolve(&req.path).await {
                return Ok(reply);
            }
            NotFound::NoStaticFile
        } else {
            NotFound::NoRoute
        };

        if let Some(fallback) = &self.fallback {
            return fallback(req).await;
        }

        tracing::debug!(path = %req.path, reason = miss.reason(), "not found");
        Ok(Reply::not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::http::http_core::types::Body;
    use crate::http::multipart::types::Files;

    fn request(method: HttpMethod, path: &str) -> RouteRequest {
        RouteRequest {
            method: Some(method),
            path: path.to_string(),
            body: Body::None,
            query: Params::new(),
            params: Params::new(),
            files: Files::new(),
        }
    }

    async fn echo_params(req: RouteRequest) -> HandlerResult {
        Ok(Reply::json(json!({ "params": req.params })))
    }

    #[test]
    fn params_bind_their_segment() {
        let pattern = Pattern::parse("/api/pin/set-mode/:pin/:mode");
        let params = pattern.matches("/api/pin/set-mode/3/out").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["pin"], "3");
        assert_eq!(params["mode"], "out");

        assert_eq!(pattern.matches("/api/pin/set-mode/3"), None);
        assert_eq!(pattern.matches("/api/pin/set-mode/3/out/extra"), None);
        assert_eq!(pattern.matches("/api/pin/get-mode/3/out"), None);
    }

    #[test]
    fn params_are_decoded_after_splitting() {
        let pattern = Pattern::parse("/files/:name");
        let params = pattern.matches("/files/a%2Fb").unwrap();
        assert_eq!(params["name"], "a/b");
        assert_eq!(pattern.matches("/files/a/b"), None);

        assert!(Pattern::parse("/my files/:id").matches("/my%20files/3").is_some());
    }

    #[test]
    fn empty_segments_are_ignored() {
        let pattern = Pattern::parse("/upload/:id/");
        assert_eq!(pattern.matches("//upload/7").unwrap().get("id").map(String::as_str), Some("7"));
        assert!(Pattern::parse("/").matches("/").unwrap().is_empty());
    }

    #[test]
    fn match_route_filters_by_method_and_order() {
        let mut router = Router::new();
        router.get("/items/:id", echo_params);
        router.get("/items/special", echo_params);
        router.post("/items/:item", echo_params);

        let (route, params) = router.match_route(HttpMethod::GET, "/items/special").unwrap();
        assert_eq!(route.pattern.as_str(), "/items/:id");
        assert_eq!(params["id"], "special");

        let (route, params) = router.match_route(HttpMethod::POST, "/items/4").unwrap();
        assert_eq!(route.pattern.as_str(), "/items/:item");
        assert_eq!(params["item"], "4");

        assert!(router.match_route(HttpMethod::DELETE, "/items/4").is_none());
    }

    #[tokio::test]
    async fn same_method_and_pattern_replaces_handler() {
        let mut router = Router::new();
        router.get("/v", |_req| async { Ok(Reply::json(json!({ "v": 1 }))) });
        router.get("/v", |_req| async { Ok(Reply::json(json!({ "v": 2 }))) });
        assert_eq!(router.routes.len(), 1);

        let reply = router.dispatch(request(HttpMethod::GET, "/v")).await.unwrap();
        assert_eq!(reply, Reply::json(json!({ "v": 2 })));
    }

    #[tokio::test]
    async fn dispatch_fills_params() {
        let mut router = Router::new();
        router.post("/api/pin/set-mode/:pin/:mode", echo_params);

        let reply = router
            .dispatch(request(HttpMethod::POST, "/api/pin/set-mode/5/in"))
            .await
            .unwrap();
        assert_eq!(reply, Reply::json(json!({ "params": { "pin": "5", "mode": "in" } })));
    }

    #[tokio::test]
    async fn misses_are_404() {
        let router = Router::new();
        for method in [HttpMethod::GET, HttpMethod::POST] {
            let reply = router.dispatch(request(method, "/does-not-exist")).await.unwrap();
            assert_eq!(reply.status(), 404);
            assert_eq!(reply, Reply::not_found());
        }
        let mut unsupported = request(HttpMethod::GET, "/");
        unsupported.method = None;
        assert_eq!(router.dispatch(unsupported).await.unwrap().status(), 404);
    }

    #[tokio::test]
    async fn routes_win_over_statics_and_fallback_comes_last() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();

        let mut router = Router::new();
        router.static_dir("/", dir.path());
        router.get("/", |_req| async { Ok(Reply::json(json!({ "from": "route" }))) });
        router.fallback(|_req| async { Ok(Reply::raw_typed("spa", 200, "text/html")) });

        let reply = router.dispatch(request(HttpMethod::GET, "/")).await.unwrap();
        assert_eq!(reply, Reply::json(json!({ "from": "route" })));

        let reply = router.dispatch(request(HttpMethod::GET, "/index.html")).await.unwrap();
        assert!(matches!(reply, Reply::StaticFile { .. }));

        let reply = router.dispatch(request(HttpMethod::GET, "/settings/wifi")).await.unwrap();
        assert_eq!(reply, Reply::raw_typed("spa", 200, "text/html"));
    }
}
