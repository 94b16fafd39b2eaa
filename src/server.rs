use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose};
use futures_util::StreamExt;
use log::{error, info};
use tokio::{net::TcpListener, sync::watch};

use crate::config::Config;
use crate::notifier::Notifier;
use crate::printer::PrinterClient;

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub printer_client: Arc<PrinterClient>,
    pub notifier: Arc<Notifier>,
    /// Plain client for the smart plug; the plug speaks unauthenticated local
    /// HTTP, so the printer client's relaxed TLS settings are not wanted here.
    plug_client: reqwest::Client,
    /// Precomputed `Authorization` value the operator must present.
    expected_auth: String,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        printer_client: Arc<PrinterClient>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let expected_auth = basic_auth_header(&config.auth_username, &config.auth_password);
        Self {
            config,
            printer_client,
            notifier,
            plug_client: reqwest::Client::new(),
            expected_auth,
        }
    }
}

/// Encode a basic-auth credential pair into an `Authorization` header value.
fn basic_auth_header(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode(credentials.as_bytes())
    )
}

/// Check the request's `Authorization` header against the expected value.
/// Plain byte equality, no parsing of the credential pair.
fn authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Login Required\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Build the operator-facing router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/{printer}/", get(view))
        .route("/{printer}/cam/", get(webcam))
        .route("/{printer}/status/", get(status))
        .route("/{printer}/cancel/", post(cancel))
        .route("/lights/on/", get(lights_on))
        .route("/lights/off/", get(lights_off))
        .with_state(state)
}

/// Serve the router until the shutdown signal flips.
pub async fn serve(state: Arc<AppState>, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(&state.config.listen_addr).await?;
    info!("Server is listening on {}...", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// Proxy the upstream MJPEG webcam stream byte-for-byte.
///
/// Upstream response headers are forwarded as-is and the body is streamed
/// until the upstream closes or the viewer goes away.
async fn webcam(
    State(state): State<Arc<AppState>>,
    Path(printer): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.expected_auth) {
        return unauthorized();
    }
    if state.config.printer(&printer).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let upstream = match state
        .printer_client
        .webcam_stream(&printer, &state.expected_auth)
        .await
    {
        Ok(response) => response,
        Err(e) => return (StatusCode::BAD_GATEWAY, format!("{:#}", e)).into_response(),
    };

    let mut builder = Response::builder().status(upstream.status());
    for (key, value) in upstream.headers() {
        builder = builder.header(key, value);
    }

    let stream = upstream
        .bytes_stream()
        .map(|chunk| chunk.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)));

    match builder.body(Body::from_stream(stream)) {
        Ok(response) => response,
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}

/// Fetch the printer's job status and pass it through as JSON.
async fn status(
    State(state): State<Arc<AppState>>,
    Path(printer): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.expected_auth) {
        return unauthorized();
    }
    if state.config.printer(&printer).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.printer_client.get_job_status(&printer).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)).into_response(),
    }
}

/// Cancel the running print job and notify the chat room with the upstream
/// response body. A failed notification is logged, never surfaced.
async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(printer): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.expected_auth) {
        return unauthorized();
    }
    if state.config.printer(&printer).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let body = match state.printer_client.cancel_job(&printer).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)).into_response(),
    };

    info!("{}: cancel requested, upstream replied: {}", printer, body);

    if let Err(e) = state
        .notifier
        .send_message(&format!("🛑 Cancel requested for {}: {}", printer, body))
        .await
    {
        error!("{}: failed to send cancel notification: {:#}", printer, e);
    }

    body.into_response()
}

async fn lights_on(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    set_lights(&state, &headers, "On").await
}

async fn lights_off(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    set_lights(&state, &headers, "Off").await
}

/// Forward a power command to the smart plug.
///
/// Any successful round trip is reported as 200; the plug's JSON payload is
/// not inspected.
async fn set_lights(state: &AppState, headers: &HeaderMap, power: &str) -> Response {
    if !authorized(headers, &state.expected_auth) {
        return unauthorized();
    }

    let url = format!("{}/cm?cmnd=Power%20{}", state.config.plug_url, power);
    match state.plug_client.get(&url).send().await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, format!("{:#}", e)).into_response(),
    }
}

/// Index page listing the configured printers.
async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.expected_auth) {
        return unauthorized();
    }

    let printers: String = state
        .config
        .printers
        .iter()
        .map(|p| format!("    <li><a href=\"/{0}/\">{0}</a></li>\n", p.name))
        .collect();

    Html(INDEX_PAGE.replace("{{PRINTERS}}", &printers)).into_response()
}

/// Per-printer HTML view: webcam image, polled status line, lights toggle and
/// a cancel button.
async fn view(
    State(state): State<Arc<AppState>>,
    Path(printer): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers, &state.expected_auth) {
        return unauthorized();
    }
    if state.config.printer(&printer).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }

    Html(VIEW_PAGE.replace("{{PRINTER}}", &printer)).into_response()
}

const INDEX_PAGE: &str = r##"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>printdash</title>
  <style>
    body { font-family: sans-serif; background: #10141a; color: #e6f0ff; margin: 2em; }
    a { color: #7fd17a; }
  </style>
</head>
<body>
  <h1>printdash</h1>
  <ul>
{{PRINTERS}}  </ul>
  <p><a href="/lights/on/">lights on</a> · <a href="/lights/off/">lights off</a></p>
</body>
</html>
"##;

const VIEW_PAGE: &str = r##"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>{{PRINTER}}</title>
  <style>
    body { font-family: sans-serif; background: #10141a; color: #e6f0ff; margin: 2em; }
    img.cam { max-width: 100%; border: 1px solid #2a3342; border-radius: 6px; }
    .status { margin: 1em 0; font-size: 1.1em; }
    button { background: #b33; color: #fff; border: none; padding: 0.5em 1em; border-radius: 4px; cursor: pointer; }
    label { margin-right: 1.5em; }
  </style>
</head>
<body>
  <h1>{{PRINTER}}</h1>
  <img class="cam" src="/{{PRINTER}}/cam/" alt="webcam stream" />
  <div id="status" class="status">loading status...</div>
  <label><input type="checkbox" id="lights" /> workshop lights</label>
  <button id="cancel">Cancel print</button>
  <script>
    const printer = "{{PRINTER}}";

    async function refreshStatus() {
      const el = document.getElementById("status");
      try {
        const resp = await fetch(`/${printer}/status/`);
        if (!resp.ok) throw new Error(`HTTP ${resp.status}`);
        const job = await resp.json();
        el.textContent = `${job.state} - ${job.progress.completion.toFixed(1)}% complete`;
      } catch (err) {
        el.textContent = `status unavailable (${err.message})`;
      }
    }
    refreshStatus();
    setInterval(refreshStatus, 5000);

    document.getElementById("lights").addEventListener("change", (ev) => {
      fetch(ev.target.checked ? "/lights/on/" : "/lights/off/");
    });

    document.getElementById("cancel").addEventListener("click", () => {
      if (confirm(`Cancel the current print on ${printer}?`)) {
        fetch(`/${printer}/cancel/`, { method: "POST" });
      }
    });
  </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn basic_auth_header_encodes_the_pair() {
        // base64("operator:hunter2")
        assert_eq!(
            basic_auth_header("operator", "hunter2"),
            "Basic b3BlcmF0b3I6aHVudGVyMg=="
        );
    }

    #[test]
    fn authorized_requires_an_exact_match() {
        let expected = basic_auth_header("operator", "hunter2");

        let mut headers = HeaderMap::new();
        assert!(!authorized(&headers, &expected));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&basic_auth_header("operator", "wrong")).unwrap(),
        );
        assert!(!authorized(&headers, &expected));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&expected).unwrap(),
        );
        assert!(authorized(&headers, &expected));
    }

    #[test]
    fn unauthorized_carries_the_challenge_header() {
        let response = unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Login Required\""
        );
    }
}
