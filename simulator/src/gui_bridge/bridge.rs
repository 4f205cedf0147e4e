use crate::generator::profile::GeneratorConfig;
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::Runner;
use log::{error, info};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

type SharedModel = Arc<RwLock<VisualizationModel>>;

fn store(state: &SharedModel, model: VisualizationModel) {
    let mut guard = state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = model;
}

/// Serves the latest result table to renderers and runs scenarios on request.
///
/// `GET /results` returns the current [`VisualizationModel`]; `POST
/// /ingest-config` takes a [`GeneratorConfig`], processes it and replaces the
/// model.
pub struct GuiBridge {
    state: SharedModel,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>, bind: SocketAddr) -> Self {
        let state: SharedModel = Arc::new(RwLock::new(VisualizationModel::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner_filter = warp::any().map(move || runner.clone());

        let get_route = warp::path("results")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let guard = state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
                warp::reply::json(&*guard)
            });

        let generator_route = warp::path("ingest-config")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |config: GeneratorConfig, state: SharedModel, runner: Arc<Runner>| async move {
                    let outcome =
                        tokio::task::spawn_blocking(move || {
                            runner.execute_scenario(&config).map(|result| {
                                let model = VisualizationModel::from_result(
                                    &result,
                                    runner.config().coherence_threshold,
                                    config.scenario.clone(),
                                );
                                (model, config.description.unwrap_or_default())
                            })
                        })
                        .await;
                    match outcome {
                        Ok(Ok((model, description))) => {
                            let rows = model.table.rows.len();
                            if let Some(name) = model.scenario.as_ref() {
                                info!("[GUI] scenario {} -> {} estimates", name, rows);
                            }
                            store(&state, model);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "estimates": rows,
                                    "description": description
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Ok(Err(err)) => {
                            error!("ingest-config error: {:#}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                        Err(err) => {
                            error!("ingest-config task failed: {}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        thread::spawn(move || {
            let routes = get_route.or(generator_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build bridge runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(async move {
                warp::serve(routes).run(bind).await;
            });
        });

        Self { state }
    }

    pub fn publish(&self, model: &VisualizationModel) {
        info!(
            "[GUI] {} rows, {} above coherence {}",
            model.table.rows.len(),
            model.coherent_rows.len(),
            model.coherence_threshold
        );
        store(&self.state, model.clone());
    }

    pub fn publish_status(&self, message: &str) {
        info!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
