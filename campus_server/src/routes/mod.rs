use axum::Router;

use crate::state::AppState;

mod academic;
mod activities;
mod activity_types;
mod admins;
mod assignments;
mod attachments;
mod auth;
mod channels;
mod faculty;
mod friendships;
mod health;
mod institutes;
mod messages;
mod notifications;
mod programs;
mod students;
mod users;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(messages::router())
        .merge(attachments::router())
        .merge(notifications::router())
        .merge(channels::router())
        .merge(friendships::router())
        .merge(institutes::router())
        .merge(programs::router())
        .merge(students::router())
        .merge(academic::router())
        .merge(faculty::router())
        .merge(activities::router())
        .merge(activity_types::router())
        .merge(assignments::router())
        .merge(admins::router())
}
