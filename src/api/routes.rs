use axum::routing::{get, post};
use axum::{middleware, Router};

use super::handlers::*;
use super::{track_metrics, AppState};

pub fn routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/surfaces", post(create_surface))
        .route("/surfaces/all", get(list_surfaces))
        .route(
            "/surfaces/id/{id}",
            get(get_surface)
                .put(update_surface)
                .patch(patch_surface)
                .delete(delete_surface),
        )
        .route("/courts", post(create_court))
        .route("/courts/all", get(list_courts))
        .route(
            "/courts/id/{id}",
            get(get_court)
                .put(update_court)
                .patch(patch_court)
                .delete(delete_court),
        )
        .route("/customers", post(create_customer))
        .route("/customers/all", get(list_customers))
        .route(
            "/customers/id/{id}",
            get(get_customer)
                .put(update_customer)
                .patch(patch_customer)
                .delete(delete_customer),
        )
        .route("/customers/phone/{phone}", get(get_customer_by_phone))
        .route("/reservations", post(create_reservation))
        .route("/reservations/all", get(list_reservations))
        .route(
            "/reservations/id/{id}",
            get(get_reservation)
                .put(update_reservation)
                .patch(patch_reservation)
                .delete(delete_reservation),
        )
        .route("/reservations/court/{id}", get(reservations_by_court))
        .route("/reservations/phone/all/{phone}", get(reservations_by_phone))
        .route(
            "/reservations/phone/future/{phone}",
            get(future_reservations_by_phone),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}
