//! The metadata store holds component and assembly records. Provisioners
//! read a record before touching a box and write status changes back.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};

use crate::component::{ApiComponent, Component};
use crate::config::ApiConfig;
use crate::error::{Result, VerticeError};

const HEADER_EMAIL: &str = "X-Megam-EMAIL";
const HEADER_ORG: &str = "X-Megam-ORG";
const HEADER_APIKEY: &str = "X-Megam-APIKEY";

pub trait MetadataStore: Send + Sync {
    fn fetch_component(&self, id: &str) -> Result<Component>;

    /// Replace the stored record with `component`.
    fn update_component(&self, component: &Component) -> Result<()>;

    fn delete_component(&self, id: &str) -> Result<()>;

    fn delete_assembly(&self, id: &str) -> Result<()>;
}

/// [`MetadataStore`] backed by the HTTP API.
pub struct HttpStore {
    client: Client,
    base: String,
    email: String,
    org_id: String,
    api_key: String,
}

impl HttpStore {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base: api.url.trim_end_matches('/').to_string(),
            email: api.email.clone(),
            org_id: api.org_id.clone(),
            api_key: api.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(HEADER_EMAIL, &self.email)
            .header(HEADER_ORG, &self.org_id)
            .header(HEADER_APIKEY, &self.api_key)
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = self.authed(req).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(VerticeError::Store(format!("{what}: HTTP {status}: {body}")));
        }
        Ok(resp)
    }
}

impl MetadataStore for HttpStore {
    fn fetch_component(&self, id: &str) -> Result<Component> {
        let req = self.client.get(self.url(&format!("/assembly/{id}")));
        let resp = self.send(req, &format!("fetch component {id}"))?;
        let envelope: ApiComponent = resp.json()?;
        Ok(envelope.results)
    }

    fn update_component(&self, component: &Component) -> Result<()> {
        tracing::debug!(component = %component.id, status = %component.status, "updating component");
        let req = self
            .client
            .post(self.url("/components/update"))
            .json(component);
        self.send(req, &format!("update component {}", component.id))?;
        Ok(())
    }

    fn delete_component(&self, id: &str) -> Result<()> {
        let req = self.client.delete(self.url(&format!("/components/{id}")));
        self.send(req, &format!("delete component {id}"))?;
        Ok(())
    }

    fn delete_assembly(&self, id: &str) -> Result<()> {
        let req = self.client.delete(self.url(&format!("/assembly/{id}")));
        self.send(req, &format!("delete assembly {id}"))?;
        Ok(())
    }
}
