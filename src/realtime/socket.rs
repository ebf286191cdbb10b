//! Websocket endpoint pushing `track:update` events

use std::{sync::Arc, thread, time::Duration};

use rouille::{Request, Response, websocket};
use serde::Serialize;

use crate::{
    domain::stats::TrackUpdate,
    realtime::{Broadcaster, Next, Subscription},
};

pub const TRACK_UPDATE_EVENT: &str = "track:update";

/// How long an idle connection waits before checking for new updates again
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Text frame sent to clients
#[derive(Debug, Serialize)]
pub struct PushEvent<'a> {
    pub event: &'static str,
    pub data: &'a TrackUpdate,
}

impl<'a> From<&'a TrackUpdate> for PushEvent<'a> {
    fn from(update: &'a TrackUpdate) -> Self {
        Self {
            event: TRACK_UPDATE_EVENT,
            data: update,
        }
    }
}

/// Upgrades the request and subscribes the connection.
///
/// The subscription is registered before the handshake completes, so the
/// client receives every update published after this call.
pub fn upgrade(request: &Request, broadcaster: &Arc<Broadcaster>) -> Response {
    let (response, websocket) = match websocket::start::<String>(request, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            log::debug!("Rejected websocket upgrade: {e:?}");
            return Response::text("expected a websocket upgrade").with_status_code(400);
        }
    };

    let mut updates = broadcaster.subscribe();
    let subscribers = Arc::clone(broadcaster);
    let peer = request.remote_addr().to_string();

    thread::spawn(move || {
        let Ok(mut socket) = websocket.recv() else {
            log::debug!("Websocket handshake with {peer} did not complete");
            return;
        };
        log::info!(
            "Realtime client connected: {peer} ({} subscribers)",
            subscribers.subscriber_count()
        );
        pump(&mut updates, &mut socket, IDLE_POLL);
        log::info!(
            "Realtime client disconnected: {peer}, {} updates dropped while lagging",
            updates.missed()
        );
    });

    response
}

/// Outgoing side of a realtime connection
pub trait Link {
    /// Sends one text frame, false once the connection is gone
    fn send(&mut self, frame: &str) -> bool;

    fn is_closed(&self) -> bool;
}

impl Link for websocket::Websocket {
    fn send(&mut self, frame: &str) -> bool {
        self.send_text(frame).is_ok()
    }

    fn is_closed(&self) -> bool {
        websocket::Websocket::is_closed(self)
    }
}

/// Forwards updates as JSON frames until the connection or the broadcaster
/// goes away. An idle connection is checked every `idle` interval.
pub fn pump<L: Link>(updates: &mut Subscription, link: &mut L, idle: Duration) {
    loop {
        let update = match updates.try_next() {
            Next::Update(update) => update,
            Next::Closed => break,
            Next::Idle => {
                if link.is_closed() {
                    break;
                }
                thread::sleep(idle);
                continue;
            }
        };

        let frame = match serde_json::to_string(&PushEvent::from(&update)) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode update for {}: {e}", update.track_id);
                continue;
            }
        };
        if !link.send(&frame) {
            break;
        }
    }
}
