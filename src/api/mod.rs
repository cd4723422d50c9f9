mod handlers;

use axum::{
    extract::FromRef,
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::breeds::BreedValidator;
use crate::db::Database;

pub use handlers::ErrorBody;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub breeds: BreedValidator,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for BreedValidator {
    fn from_ref(state: &AppState) -> Self {
        state.breeds.clone()
    }
}

/// Router with permissive CORS, for local use and tests.
pub fn create_router(db: Database, breeds: BreedValidator) -> Router {
    create_router_with_cors(db, breeds, None)
}

/// Router that only allows the given CORS origins. `None` allows any origin.
pub fn create_router_with_cors(
    db: Database,
    breeds: BreedValidator,
    cors_origins: Option<&[String]>,
) -> Router {
    let api = Router::new()
        // Cats
        .route("/cats", get(handlers::list_cats).post(handlers::create_cat))
        .route(
            "/cats/{id}",
            get(handlers::get_cat)
                .put(handlers::replace_cat)
                .patch(handlers::update_cat)
                .delete(handlers::delete_cat),
        )
        .route("/cats/{id}/availability", get(handlers::get_cat_availability))
        // Missions
        .route(
            "/missions",
            get(handlers::list_missions).post(handlers::create_mission),
        )
        .route(
            "/missions/{id}",
            get(handlers::get_mission)
                .put(handlers::replace_mission)
                .patch(handlers::update_mission)
                .delete(handlers::delete_mission),
        )
        .route("/missions/{id}/assign_cat", post(handlers::assign_cat))
        .route("/missions/{id}/unassign_cat", post(handlers::unassign_cat))
        .route("/missions/{id}/complete", post(handlers::complete_mission))
        // Targets (always through their mission)
        .route("/missions/{id}/targets", post(handlers::add_target))
        .route(
            "/missions/{id}/targets/{target_id}",
            patch(handlers::update_target).delete(handlers::remove_target),
        )
        .route(
            "/missions/{id}/targets/{target_id}/complete",
            post(handlers::complete_target),
        )
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(AppState { db, breeds })
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
