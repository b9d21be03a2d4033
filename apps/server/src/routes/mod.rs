use actix_web::web::ServiceConfig;

mod api;
mod dashboard;
mod health;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.configure(health::routes).configure(dashboard::routes).configure(api::routes);
}
