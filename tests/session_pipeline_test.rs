//! インテグレーションテスト（パイプライン + セッションミドルウェア + メモリエンジン）

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use runbridge_session::{
        handler, CookieOptions, CookieOverrides, Error, MemorySessionEngine, Method, Middleware,
        Next, Pipeline, Request, Response, SessionCookieMiddleware, SessionEngine, SessionStatus,
    };

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct CartResponse {
        items: Vec<String>,
    }

    fn engine() -> Arc<MemorySessionEngine> {
        Arc::new(MemorySessionEngine::with_cookie_params(CookieOptions::default()))
    }

    fn cart_app(engine: Arc<MemorySessionEngine>, overrides: CookieOverrides) -> Pipeline {
        let middleware = SessionCookieMiddleware::with_overrides(engine.clone(), overrides)
            .expect("valid session options");

        let add_engine = engine.clone();
        let list_engine = engine.clone();
        let logout_engine = engine;

        Pipeline::builder()
            .middleware(middleware)
            .handler(handler::post("/cart", move |req: Request| {
                let engine = add_engine.clone();
                async move {
                    let item: String = req.json()?;
                    let mut items = engine.get_as::<Vec<String>>("items")?.unwrap_or_default();
                    items.push(item);
                    engine.insert("items", &items)?;
                    Ok::<_, Error>(CartResponse { items })
                }
            }))
            .handler(handler::get("/cart", move |_req: Request| {
                let engine = list_engine.clone();
                async move {
                    let items = engine.get_as::<Vec<String>>("items")?.unwrap_or_default();
                    Ok::<_, Error>(CartResponse { items })
                }
            }))
            .handler(handler::delete("/session", move |_req: Request| {
                let engine = logout_engine.clone();
                async move {
                    // 早期にセッションを閉じるのは禁止されている
                    engine.destroy()?;
                    Ok::<_, Error>(Response::ok())
                }
            }))
            .build()
    }

    fn post_item(item: &str) -> Request {
        Request::new(Method::POST, "/cart".to_string())
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_vec(item).unwrap())
    }

    #[tokio::test]
    async fn test_session_survives_across_requests() {
        let engine = engine();
        let app = cart_app(engine.clone(), CookieOverrides::new().name("cart_sid").httponly(true));

        let first = app.dispatch(post_item("apple")).await.expect("first request");
        assert_eq!(first.cookies.len(), 1);
        let cookie = first.cookies[0].clone();
        assert_eq!(cookie.name, "cart_sid");
        assert!(cookie.http_only);

        let second = app
            .dispatch(post_item("pear").with_header("Cookie", format!("cart_sid={}", cookie.value)))
            .await
            .expect("second request");
        assert_eq!(second.cookies[0].value, cookie.value);

        let listed = app
            .dispatch(
                Request::new(Method::GET, "/cart".to_string())
                    .with_cookie("cart_sid", cookie.value.as_str()),
            )
            .await
            .expect("list request");
        let body: CartResponse = serde_json::from_slice(listed.body.as_ref().unwrap()).unwrap();
        assert_eq!(body.items, vec!["apple".to_string(), "pear".to_string()]);
        assert_eq!(engine.status(), SessionStatus::None);
        assert_eq!(engine.stored_sessions(), 1);
    }

    #[tokio::test]
    async fn test_requests_without_cookie_get_distinct_sessions() {
        let engine = engine();
        let app = cart_app(engine.clone(), CookieOverrides::new());

        let a = app.dispatch(post_item("a")).await.unwrap();
        let b = app.dispatch(post_item("b")).await.unwrap();

        assert_ne!(a.cookies[0].value, b.cookies[0].value);
        assert_eq!(a.cookies[0].name, "SESSIONID");
        assert_eq!(engine.stored_sessions(), 2);
    }

    #[tokio::test]
    async fn test_malformed_cookie_gets_a_usable_replacement() {
        let engine = engine();
        let app = cart_app(engine.clone(), CookieOverrides::new());

        let first = app
            .dispatch(post_item("apple").with_header("Cookie", "SESSIONID=abc,def"))
            .await
            .expect("malformed cookie is replaced, not rejected");
        let issued = first.cookies[0].value.clone();
        assert_ne!(issued, "abc,def");
        assert!(engine.stored("abc,def").is_none());

        let listed = app
            .dispatch(
                Request::new(Method::GET, "/cart".to_string())
                    .with_header("Cookie", format!("SESSIONID={}", issued)),
            )
            .await
            .expect("list request");
        assert_eq!(listed.cookies[0].value, issued);
        let body: CartResponse = serde_json::from_slice(listed.body.as_ref().unwrap()).unwrap();
        assert_eq!(body.items, vec!["apple".to_string()]);
    }

    #[tokio::test]
    async fn test_destroying_session_downstream_is_an_error() {
        let app = cart_app(engine(), CookieOverrides::new());

        let result = app
            .dispatch(Request::new(Method::DELETE, "/session".to_string()))
            .await;
        assert!(matches!(result, Err(Error::SessionAlreadyClosed)));

        let response = app
            .respond(Request::new(Method::DELETE, "/session".to_string()))
            .await;
        assert_eq!(response.status, 500);
        assert!(response.cookies.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_session_middleware_is_rejected() {
        let engine = engine();
        let app = Pipeline::builder()
            .middleware(SessionCookieMiddleware::new(engine.clone()).unwrap())
            .middleware(SessionCookieMiddleware::new(engine.clone()).unwrap())
            .handler(handler::get("/", |_req: Request| async { Ok::<_, Error>(Response::ok()) }))
            .build();

        let result = app.dispatch(Request::new(Method::GET, "/".to_string())).await;
        assert!(matches!(result, Err(Error::SessionAlreadyStarted)));
    }

    #[tokio::test]
    async fn test_disabled_engine_rejects_requests() {
        let engine = Arc::new(MemorySessionEngine::disabled());
        let app = Pipeline::builder()
            .middleware(SessionCookieMiddleware::new(engine).unwrap())
            .handler(handler::get("/", |_req: Request| async { Ok::<_, Error>(Response::ok()) }))
            .build();

        let result = app.dispatch(Request::new(Method::GET, "/".to_string())).await;
        assert!(matches!(result, Err(Error::SessionsDisabled)));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = cart_app(engine(), CookieOverrides::new());
        let result = app.dispatch(Request::new(Method::GET, "/missing".to_string())).await;
        assert!(matches!(result, Err(Error::RouteNotFound(_))));
    }

    /// 呼び出し順を記録するミドルウェア
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn process(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
            self.log.lock().unwrap().push(format!("{}:before", self.label));
            let res = next.run(req).await?;
            self.log.lock().unwrap().push(format!("{}:after", self.label));
            Ok(res.with_header(format!("X-{}", self.label), "seen"))
        }
    }

    #[tokio::test]
    async fn test_middleware_order_and_session_cookie_on_http_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = engine();
        let app = Pipeline::builder()
            .middleware(Recorder { label: "outer", log: log.clone() })
            .middleware(SessionCookieMiddleware::new(engine.clone()).unwrap())
            .middleware(Recorder { label: "inner", log: log.clone() })
            .handler(handler::get("/", |_req: Request| async {
                Ok::<_, Error>(Response::ok().text("hi"))
            }))
            .build();

        let http_req = http::Request::builder()
            .method("GET")
            .uri("/")
            .header("Cookie", "theme=dark")
            .body(Vec::new())
            .unwrap();
        let res = app.dispatch(Request::from_http(http_req).unwrap()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
        assert_eq!(res.headers.get("X-inner"), Some(&"seen".to_string()));

        let http_res = res.into_http().unwrap();
        let set_cookie = http_res.headers().get(http::header::SET_COOKIE).unwrap();
        assert!(set_cookie.to_str().unwrap().starts_with("SESSIONID="));
        assert!(set_cookie.to_str().unwrap().contains("; Max-Age=0; Path=/"));
    }
}
