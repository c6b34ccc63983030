use std::sync::Arc;

use log::info;
use serde::Serialize;

use runbridge_session::{
    handler, CookieOverrides, Error, MemorySessionEngine, Method, Pipeline, Request,
    SessionCookieMiddleware,
};

#[derive(Serialize)]
struct Visits {
    visits: i64,
}

/// セッションの訪問回数を数えるハンドラー
async fn count_visits(engine: Arc<MemorySessionEngine>) -> Result<Visits, Error> {
    let visits = engine.get_as::<i64>("visits")?.unwrap_or(0) + 1;
    engine.insert("visits", visits)?;
    info!("Visit #{} recorded", visits);
    Ok(Visits { visits })
}

#[tokio::main]
async fn main() {
    // ロガーの初期化
    env_logger::init();

    let engine = Arc::new(MemorySessionEngine::new());
    let overrides = CookieOverrides::new().httponly(true).lifetime(3600);
    let middleware = match SessionCookieMiddleware::with_overrides(engine.clone(), overrides) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Invalid session configuration: {}", e);
            std::process::exit(1);
        }
    };
    let cookie_name = middleware.options().name.clone();

    let counter_engine = engine.clone();
    let app = Pipeline::builder()
        .middleware(middleware)
        .handler(handler::get("/", move |_req: Request| count_visits(counter_engine.clone())))
        .build();

    info!("Simulating three requests sharing one session");

    let mut session_id: Option<String> = None;
    for _ in 0..3 {
        let mut req = Request::new(Method::GET, "/".to_string());
        if let Some(id) = &session_id {
            req = req.with_cookie(cookie_name.as_str(), id.as_str());
        }

        let res = app.respond(req).await;
        if res.status != 200 {
            // ハンドラー失敗時はホスト側で後始末する
            engine.abort();
        }
        for header in res.set_cookie_headers() {
            println!("Set-Cookie: {}", header);
        }
        if let Some(body) = &res.body {
            println!("{}", String::from_utf8_lossy(body));
        }

        session_id = res
            .cookies
            .iter()
            .find(|c| c.name == cookie_name)
            .map(|c| c.value.clone());
    }
}
