//! Runs a handful of requests through a small route table and prints the responses.
//!
//! `cargo run --example routing`

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Uri};
use micro_snap::micro_snap_http::protocol::{Request, RequestBody};
use micro_snap::{
    bracket_snap, dir, first_of, get, handler_fn, if_top, path_arg, post, with_env, BoxHandler, Deadline, Driver,
    HandlerExt, Outcome, SnapContext, SnapError,
};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize)]
struct Search {
    q: String,
    #[serde(default)]
    page: u32,
}

struct Counter {
    hits: AtomicU64,
}

fn routes() -> BoxHandler<()> {
    let index = if_top(handler_fn(|snap| {
        async move {
            snap.write_text("index");
            Ok(Outcome::Value(()))
        }
        .boxed()
    }));

    let user = dir(
        "users",
        path_arg(|id: u64| {
            handler_fn(move |snap| {
                async move {
                    let body = serde_json::json!({ "id": id, "name": format!("user-{id}") });
                    snap.set_content_type(&mime::APPLICATION_JSON);
                    snap.write_text(body.to_string());
                    Ok(Outcome::Value(()))
                }
                .boxed()
            })
        }),
    );

    let search = dir(
        "search",
        handler_fn(|snap| {
            async move {
                let search: Search = snap.query()?;
                snap.write_text(format!("searching {:?}, page {}", search.q, search.page));
                Ok(Outcome::Value(()))
            }
            .boxed()
        }),
    );

    let echo = dir(
        "echo",
        handler_fn(|snap| {
            async move {
                let body = snap.read_request_body(1024).await?;
                snap.write_bytes(body);
                Ok(Outcome::Value(()))
            }
            .boxed()
        }),
    );

    let old = dir("old", handler_fn(|snap| async move { snap.redirect("/") }.boxed()));

    let counted = dir(
        "count",
        with_env(Counter { hits: AtomicU64::new(0) }, |mut ctx| {
            async move {
                let hits = ctx.env().hits.fetch_add(1, Ordering::Relaxed) + 1;
                ctx.snap_mut().write_text(format!("hit #{hits}"));
                Ok(Outcome::Value(()))
            }
            .boxed()
        }),
    );

    let pooled = dir(
        "pooled",
        handler_fn(|snap| {
            bracket_snap(
                snap,
                async {
                    info!("acquire connection");
                    Ok::<_, SnapError>(String::from("conn-1"))
                },
                |conn: String| async move {
                    info!(conn = %conn, "release connection");
                    Ok(())
                },
                |snap, conn| {
                    async move {
                        snap.write_text(format!("served with {conn}"));
                        Ok(Outcome::Value(()))
                    }
                    .boxed()
                },
            )
            .boxed()
        }),
    );

    first_of(vec![
        get(index).boxed(),
        get(user).boxed(),
        get(search).boxed(),
        post(echo).boxed(),
        get(old).boxed(),
        get(counted).boxed(),
        get(pooled).boxed(),
    ])
    .boxed()
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let routes = routes();
    let deadline = Deadline::after(30);
    let driver = Driver::builder().timeout_control(deadline.clone()).build();

    let requests = vec![
        Request::new(Method::GET, Uri::from_static("/")),
        Request::new(Method::GET, Uri::from_static("/users/42")),
        Request::new(Method::GET, Uri::from_static("/search?q=snap&page=2")),
        Request::new(Method::POST, Uri::from_static("/echo"))
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_body(RequestBody::from(Bytes::from_static(b"echo me"))),
        Request::new(Method::GET, Uri::from_static("/old")),
        Request::new(Method::GET, Uri::from_static("/count")),
        Request::new(Method::GET, Uri::from_static("/count")),
        Request::new(Method::GET, Uri::from_static("/pooled")),
        Request::new(Method::GET, Uri::from_static("/users/not-a-number")),
        Request::new(Method::GET, Uri::from_static("/missing")),
    ];

    for request in requests {
        let target = format!("{} {}", request.method(), request.uri());
        match deadline.run(driver.run(&routes, request)).await {
            Ok(Ok((_, mut response))) => {
                let status = response.status();
                let location = response.header(http::header::LOCATION).cloned();
                let body = response.take_body().into_bytes().await.unwrap_or_default();
                info!(%target, %status, ?location, body = %String::from_utf8_lossy(&body), "served");
            }
            Ok(Err(e)) => info!(%target, cause = %e, "handler failed"),
            Err(e) => info!(%target, cause = %e, "request timed out"),
        }
    }
}
