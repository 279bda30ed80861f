pub mod health;

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{admin, assignments, notifications, sla, tickets};
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /tickets                                     list, create
/// /tickets/unassignable                        open tickets with no pending requests (admin)
/// /tickets/{id}                                get
/// /tickets/{id}/comments                       list, create (drives the waiting toggle)
/// /tickets/{id}/resolve                        resolve (staff, requires assignee)
/// /tickets/{id}/close                          close, optional satisfaction rating
/// /tickets/{id}/rate                           record satisfaction rating (client, once)
/// /tickets/{id}/cancel                         cancel (admin, any non-terminal)
/// /tickets/{id}/assign                         manual assignment override (admin)
/// /tickets/{id}/chat-access                    chat access gate verdict
/// /tickets/{id}/assignment-requests            list (admin), re-broadcast (POST)
///
/// /assignment-requests/mine                    calling agent's pending requests
/// /assignment-requests/{id}/accept             first accept wins
/// /assignment-requests/{id}/reject             decline the offer
///
/// /sla/policies                                list; PUT /{priority_id} upsert (admin)
/// /sla/monitor                                 statistics (admin)
/// /sla/monitor/start|stop|check                operational controls (admin)
///
/// /notifications                               inbox list; POST /{id}/read
///
/// /categories                                  list, create (admin)
/// /agents                                      create (admin)
/// /agents/{id}/categories/{category_id}        link/unlink eligibility (admin)
/// /admin/users                                 create (admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // -- Tickets --
        .route("/tickets", get(tickets::list_tickets).post(tickets::create_ticket))
        .route("/tickets/unassignable", get(tickets::list_unassignable))
        .route("/tickets/{id}", get(tickets::get_ticket))
        .route(
            "/tickets/{id}/comments",
            get(tickets::list_comments).post(tickets::add_comment),
        )
        .route("/tickets/{id}/resolve", post(tickets::resolve_ticket))
        .route("/tickets/{id}/close", post(tickets::close_ticket))
        .route("/tickets/{id}/rate", post(tickets::rate_ticket))
        .route("/tickets/{id}/cancel", post(tickets::cancel_ticket))
        .route("/tickets/{id}/assign", post(assignments::assign_manual))
        .route("/tickets/{id}/chat-access", get(tickets::get_chat_access))
        .route(
            "/tickets/{id}/assignment-requests",
            get(assignments::list_for_ticket).post(assignments::broadcast),
        )
        // -- Assignment requests --
        .route("/assignment-requests/mine", get(assignments::list_mine))
        .route("/assignment-requests/{id}/accept", post(assignments::accept))
        .route("/assignment-requests/{id}/reject", post(assignments::reject))
        // -- SLA --
        .route("/sla/policies", get(sla::list_policies))
        .route("/sla/policies/{priority_id}", put(sla::upsert_policy))
        .route("/sla/monitor", get(sla::monitor_statistics))
        .route("/sla/monitor/start", post(sla::monitor_start))
        .route("/sla/monitor/stop", post(sla::monitor_stop))
        .route("/sla/monitor/check", post(sla::monitor_force_check))
        // -- Notifications --
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        // -- Reference data --
        .route(
            "/categories",
            get(admin::list_categories).post(admin::create_category),
        )
        .route("/agents", post(admin::create_agent))
        .route(
            "/agents/{id}/categories/{category_id}",
            put(admin::link_category).delete(admin::unlink_category),
        )
        .route("/admin/users", post(admin::create_user))
}
