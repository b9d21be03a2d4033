use actix_web::{HttpResponse, Responder, get, http::header::ContentType};

macros_utils::routes! {
    route index_route,
}

const INDEX_HTML: &str = include_str!("../../public/index.html");

/// Static status dashboard; all data comes from `/api/status`.
#[get("/")]
pub async fn index_route() -> impl Responder {
    HttpResponse::Ok().content_type(ContentType::html()).body(INDEX_HTML)
}
