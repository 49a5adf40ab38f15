use crate::handlers::{account, market, order, views};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/user/create/:user_id", post(account::create_user))
        .route("/onramp/inr", post(account::onramp))
        .route("/symbol/create/:symbol", post(market::create_symbol))
        .route("/trade/mint", post(market::mint))
        .route("/order/sell", post(order::sell))
        .route("/order/buy", post(order::buy))
        .route("/balances/inr", get(views::inr_balances))
        .route("/balances/stock", get(views::stock_balances))
        .route("/orderbook", get(views::orderbook))
        .route("/reset", post(market::reset))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
