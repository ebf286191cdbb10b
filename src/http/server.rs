use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::{HttpConfig, PublicEndpoint},
    domain::stats::StatsCounts,
    feed::ProjectedTrack,
    http::error::ApiError,
    public_endpoint::{media_base, resolve_track_urls},
    realtime::socket,
    service::StatsService,
    storage::error::StatsError,
};

pub struct HttpServer {
    service: Arc<StatsService>,
    pub config: HttpConfig,
    public_endpoint: Option<PublicEndpoint>,
}

impl HttpServer {
    pub fn new(
        service: Arc<StatsService>,
        config: HttpConfig,
        public_endpoint: Option<PublicEndpoint>,
    ) -> Self {
        Self {
            service,
            config,
            public_endpoint,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (GET) (/health) => {
                Response::text("OK")
            },
            (POST) (/tracks/{id: String}/like) => {
                self.handle_like(&id, request)
            },
            (POST) (/tracks/{id: String}/play) => {
                self.handle_play(&id)
            },
            (GET) (/tracks/{id: String}/stats) => {
                self.handle_stats(&id)
            },
            (GET) (/music/feed) => {
                let limit = Self::limit_param(request).unwrap_or(0);
                self.handle_items(request, self.service.feed(limit))
            },
            (GET) (/music/trending) => {
                self.handle_items(request, self.service.trending())
            },
            (GET) (/music/recent) => {
                let limit = Self::limit_param(request);
                self.handle_items(request, self.service.recent(limit))
            },
            (GET) (/users/{id: String}/insights) => {
                Self::respond(self.service.insights(&id).map(|insights| Response::json(&insights)))
            },
            (GET) (/ws) => {
                socket::upgrade(request, self.service.broadcaster())
            },
            _ => Response::empty_404()
        );

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn respond(result: Result<Response, StatsError>) -> Response {
        match result {
            Ok(response) => response,
            Err(e) => ApiError::from(e).into_response(),
        }
    }

    /// invalid or absent `limit` falls back to the view's default
    fn limit_param(request: &Request) -> Option<usize> {
        request
            .get_param("limit")
            .and_then(|limit| limit.trim().parse().ok())
    }

    fn handle_like(&self, track_id: &str, request: &Request) -> Response {
        // a missing or unparsable body is treated as a like without user
        let body: LikeRequest = rouille::input::json_input(request).unwrap_or_default();
        let user_id = body.user_id.as_ref().and_then(user_id_of).unwrap_or_default();

        Self::respond(self.service.like(track_id, &user_id).map(|outcome| {
            Response::json(&StatsResponse {
                track_id: track_id.to_string(),
                counts: outcome.counts,
                already_liked: Some(outcome.already_liked),
            })
        }))
    }

    fn handle_play(&self, track_id: &str) -> Response {
        Self::respond(self.service.report_play(track_id).map(|counts| {
            Response::json(&StatsResponse {
                track_id: track_id.to_string(),
                counts,
                already_liked: None,
            })
        }))
    }

    fn handle_stats(&self, track_id: &str) -> Response {
        Self::respond(self.service.lookup(track_id).map(|counts| {
            Response::json(&StatsResponse {
                track_id: track_id.to_string(),
                counts,
                already_liked: None,
            })
        }))
    }

    fn handle_items(
        &self,
        request: &Request,
        items: Result<Vec<ProjectedTrack>, StatsError>,
    ) -> Response {
        Self::respond(items.map(|mut items| {
            if let Some(base) = media_base(self.public_endpoint.as_ref(), request.header("Host")) {
                for item in &mut items {
                    resolve_track_urls(&mut item.track, &base);
                }
            }
            Response::json(&ItemsResponse { items })
        }))
    }
}

/// user ids are sent as strings by the app, as numbers by older clients
fn user_id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeRequest {
    #[serde(default)]
    user_id: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    track_id: String,
    #[serde(flatten)]
    counts: StatsCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    already_liked: Option<bool>,
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<ProjectedTrack>,
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
