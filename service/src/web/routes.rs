// tokencart_service/src/web/routes.rs

use crate::web::handlers::{order_handlers, paypal_handlers};
use actix_web::web;

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/process", web::post().to(order_handlers::process_order_handler)),
      )
      .service(
        web::scope("/paypal").route(
          "/create-order",
          web::post().to(paypal_handlers::create_paypal_order_handler),
        ),
      ),
  );
}
