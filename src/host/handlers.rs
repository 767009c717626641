use crate::host::registry::{PopupRegistry, RedirectReport};
use actix_web::{web, HttpResponse};
use url::Url;

/// Where the redirect page posts its location
pub const REPORT_PATH: &str = "/auth/popup/report";

const REDIRECT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Signing in</title>
</head>
<body>
<p>Completing sign-in. You can close this tab.</p>
<script>
(function () {
  function report(event) {
    var body = JSON.stringify({ href: window.location.href, event: event });
    if (event === "pagehide" && navigator.sendBeacon) {
      navigator.sendBeacon("/auth/popup/report", new Blob([body], { type: "application/json" }));
      return Promise.resolve();
    }
    return fetch("/auth/popup/report", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: body,
      keepalive: true
    });
  }
  window.addEventListener("pagehide", function () { report("pagehide"); });
  report("load").then(function () { window.close(); }, function () {});
})();
</script>
</body>
</html>
"#;

/// Landing page for the provider redirect
pub async fn redirect_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header(("Cache-Control", "no-store"))
        .body(REDIRECT_PAGE)
}

/// Location report from the redirect page
pub async fn report_location(
    registry: web::Data<PopupRegistry>,
    report: web::Json<RedirectReport>,
) -> HttpResponse {
    let report = report.into_inner();
    let Ok(location) = Url::parse(&report.href) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "invalid_location",
            "message": "href is not an absolute URL"
        }));
    };

    match registry.report(location, report.event) {
        Some(_) => HttpResponse::NoContent().finish(),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "no_pending_popup",
            "message": "No popup is waiting for a redirect"
        })),
    }
}

/// Register the loopback routes, serving the redirect page at `callback_path`
pub fn configure(cfg: &mut web::ServiceConfig, callback_path: &str) {
    cfg.route(callback_path, web::get().to(redirect_page))
        .route(REPORT_PATH, web::post().to(report_location));
}
