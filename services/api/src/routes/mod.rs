use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers::*, middleware::require_auth, AppState};

pub fn create_api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // Session
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        // Accounts
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/agents", get(list_agents).post(create_agent))
        .route("/agents/:id", get(get_agent).put(update_agent).delete(delete_agent))
        // Tenants
        .route("/organizations", get(list_organizations).post(create_organization))
        .route(
            "/organizations/:id",
            get(get_organization)
                .put(update_organization)
                .delete(delete_organization),
        )
        // Card design and issuance
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/:id",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/id-cards", get(list_id_cards).post(create_id_card))
        .route("/id-cards/stats", get(id_card_stats))
        .route(
            "/id-cards/:id",
            get(get_id_card).put(update_id_card).delete(delete_id_card),
        )
        .route("/id-cards/:id/status", patch(update_id_card_status))
        .route("/id-cards/:id/render", get(render_id_card))
        // Files
        .route("/upload", post(upload_file))
        .route_layer(from_fn_with_state(state, require_auth));

    Router::new()
        .route("/auth/login", post(login))
        .merge(protected)
}
