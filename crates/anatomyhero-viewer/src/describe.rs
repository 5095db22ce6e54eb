//! Description lookups: bundled catalogue first, then the Wikipedia summary
//! API. Responses come back through a shared queue and are applied on the
//! next frame; the viewer discards any that are no longer current.

use std::sync::{Arc, Mutex};

use anatomyhero_core::description::summary_url;
use anatomyhero_core::{Description, DescriptionError, DescriptionTicket, ViewerEvent};
use anatomyhero_scene::ViewerState;
use bevy::prelude::*;
use tracing::{debug, info, warn};

use crate::ui::UiState;

type Completed = Arc<Mutex<Vec<(DescriptionTicket, Result<Description, DescriptionError>)>>>;

#[derive(Resource, Default)]
pub struct DescriptionFetches {
    completed: Completed,
}

pub struct DescribePlugin;

impl Plugin for DescribePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DescriptionFetches>().add_systems(
            Update,
            (dispatch_viewer_events, apply_fetched_descriptions).chain(),
        );
    }
}

/// Consume queued viewer events: start description lookups and open the
/// annotation dialog when a point is picked
fn dispatch_viewer_events(
    mut state: ResMut<ViewerState>,
    fetches: Res<DescriptionFetches>,
    mut ui: ResMut<UiState>,
) {
    for event in state.drain_events() {
        match event {
            ViewerEvent::DescriptionRequested(ticket) => {
                if let Some(local) = state.local_description(&ticket.name) {
                    state.resolve_description(&ticket, Ok(local));
                } else {
                    let url = summary_url(
                        &state.config().descriptions.wikipedia_summary_url,
                        &ticket.name,
                    );
                    debug!(name = %ticket.name, url = %url, "Fetching description");
                    spawn_fetch(url, ticket, fetches.completed.clone());
                }
            }
            ViewerEvent::AnnotationPending(_) => ui.open_annotation_dialog(),
            ViewerEvent::SystemFailed { system, reason } => {
                warn!(system = %system, reason = %reason, "System unavailable");
            }
            ViewerEvent::LoadProgress { update, .. } if update.finished => {
                info!(percent = update.percent, "All systems resolved");
            }
            _ => {}
        }
    }
}

fn apply_fetched_descriptions(mut state: ResMut<ViewerState>, fetches: Res<DescriptionFetches>) {
    let done = match fetches.completed.lock() {
        Ok(mut done) => std::mem::take(&mut *done),
        Err(_) => return,
    };
    for (ticket, result) in done {
        state.resolve_description(&ticket, result);
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_fetch(url: String, ticket: DescriptionTicket, completed: Completed) {
    wasm_bindgen_futures::spawn_local(async move {
        let result = fetch_text(&url)
            .await
            .and_then(|body| anatomyhero_core::description::description_from_summary(&body));
        if let Ok(mut done) = completed.lock() {
            done.push((ticket, result));
        }
    });
}

#[cfg(target_arch = "wasm32")]
async fn fetch_text(url: &str) -> Result<String, DescriptionError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let window =
        web_sys::window().ok_or_else(|| DescriptionError::Transport("no window".to_string()))?;
    let resp = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| DescriptionError::Transport(format!("fetch failed: {e:?}")))?;
    let resp: web_sys::Response = resp
        .dyn_into()
        .map_err(|_| DescriptionError::Transport("unexpected response type".to_string()))?;
    if !resp.ok() {
        return Err(DescriptionError::Status(resp.status()));
    }
    let text = resp
        .text()
        .map_err(|e| DescriptionError::Transport(format!("{e:?}")))?;
    JsFuture::from(text)
        .await
        .map_err(|e| DescriptionError::Transport(format!("{e:?}")))?
        .as_string()
        .ok_or_else(|| DescriptionError::Transport("body is not text".to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_fetch(_url: String, ticket: DescriptionTicket, completed: Completed) {
    // Native builds have no browser fetch; the panel shows the fallback
    if let Ok(mut done) = completed.lock() {
        done.push((
            ticket,
            Err(DescriptionError::Transport(
                "remote descriptions are only fetched in the browser".to_string(),
            )),
        ));
    }
}
