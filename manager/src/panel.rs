use actix_web::HttpResponse;

/// The whole panel UI is one self-contained page compiled into the binary,
/// so the daemon ships as a single file.
const PANEL_HTML: &str = include_str!("../static/panel.html");

pub async fn panel_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(PANEL_HTML)
}
