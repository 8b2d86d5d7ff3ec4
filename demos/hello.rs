//! A small site: a streamed page, a mounted blog router, a redirect, and a
//! protocol fault.
//!
//! ```text
//! RUST_LOG=weft=debug,hello=info cargo run --example hello
//! curl -N http://127.0.0.1:8080/blog/posts/first
//! ```

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weft::middleware::{Logger, from_fn, mount};
use weft::template::Value;
use weft::{App, Config, HttpError, Redirect, Router, StatusCode, html};

fn blog() -> Router {
    let mut router = Router::new();

    router.get(
        "/posts/:slug",
        from_fn(|req, res, _next| {
            Box::pin(async move {
                let slug = req.param("slug").unwrap_or_default().to_owned();
                if slug == "secret" {
                    return Err(HttpError::new(StatusCode::Forbidden)
                        .message("That post is private")
                        .into());
                }

                // Arrives after the header is already on the wire.
                let comments = Value::pending(async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    (1..=3)
                        .map(|n| html!("<li>comment ", n, "</li>"))
                        .collect::<Vec<_>>()
                });

                res.set_html(html!(
                    "<!doctype html>
                    <article>
                      <h1>", slug, "</h1>
                      <ul>
                        ", comments, "
                      </ul>
                    </article>
                    "
                ));
                Ok(())
            })
        }),
    );

    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weft=debug,hello=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(development = config.development, "starting demo");

    let mut home = Router::new();
    home.get(
        "/",
        from_fn(|req, res, _next| {
            Box::pin(async move {
                res.redirect(req, Redirect::to("/blog/posts/first"));
                Ok(())
            })
        }),
    );

    App::with_config(config)
        .with(Logger)
        .with(home)
        .with(mount("/blog", blog()))
        .listen("127.0.0.1:8080")
        .await?;

    Ok(())
}
