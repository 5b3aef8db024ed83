use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, header};

use crate::{
    config::{ControllerSettings, Secret},
    controller::{
        ControllerApi,
        types::{ApiMethod, ApiRequest, ApiResponse},
    },
    error::{ReconcileError, network_failure},
};

const API_ROOT: &str = "api/eda/v1";

/// reqwest-backed controller transport using HTTP basic authentication.
#[derive(Clone)]
pub struct HttpControllerClient {
    client: Client,
    api_root: String,
    username: String,
    password: Secret,
}

impl HttpControllerClient {
    pub fn new(settings: &ControllerSettings, password: Secret) -> Result<Self, ReconcileError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!settings.validate_certs)
            .timeout(settings.timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| network_failure("building controller http client", err))?;

        Ok(Self {
            client,
            api_root: format!("{}/{}", settings.url.trim_end_matches('/'), API_ROOT),
            username: settings.username.clone(),
            password,
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }
}

fn to_reqwest_method(method: ApiMethod) -> Method {
    match method {
        ApiMethod::Get => Method::GET,
        ApiMethod::Post => Method::POST,
        ApiMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl ControllerApi for HttpControllerClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ReconcileError> {
        let url = self.url_for(&request.path);
        let action = request.describe();

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &url)
            .basic_auth(&self.username, Some(self.password.expose()))
            .header(header::ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| network_failure(&action, err))?;
        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .map_err(|err| network_failure(&action, err))?;

        tracing::debug!(
            target: "controller",
            method = request.method.as_str(),
            path = %request.path,
            status,
            "controller_response"
        );

        Ok(ApiResponse::from_text(status, raw))
    }
}
