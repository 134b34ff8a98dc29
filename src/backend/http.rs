use super::{
    dto::{ListResponse, RejectTransferBody, TransferDto},
    AcceptTransferRequest, CreateTransferRequest, InventoryApi, TransferQuery,
};
use crate::{
    config::AppConfig,
    domain::{
        BorrowRequestPayload, BorrowRequestReceipt, CatalogItem, Company, Customer,
        HierarchyScope, Project, TransferDetail, TransferId, TransferSummary, UserId,
        WarehouseId, WorkOrder,
    },
    errors::ServiceError,
    retry::{with_retry, RetryConfig, TransportRetryPolicy},
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// REST client for the inventory backend.
///
/// Every request carries the bearer token. Reads are retried with back-off on
/// transport failures; writes are sent once and any failure is returned as-is.
#[derive(Clone)]
pub struct HttpInventoryApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    retry: RetryConfig,
}

impl std::fmt::Debug for HttpInventoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInventoryApi")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl HttpInventoryApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ServiceError::ValidationError(format!("Invalid API base URL {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::ValidationError(format!(
                "API base URL {} cannot carry paths",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            retry: RetryConfig::default(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.request_timeout(),
        )?
        .with_retry(RetryConfig::from_app_config(config)))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::ValidationError(format!(
                    "API base URL {} cannot carry paths",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps a non-success response to the matching error and logs it.
    async fn check(response: Response, url: &Url) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        } else {
            body
        };

        let err = if status.as_u16() == 404 {
            ServiceError::NotFound(format!("Resource at {}", url.path()))
        } else {
            ServiceError::from_status(status.as_u16(), message)
        };
        error!(status = status.as_u16(), path = url.path(), "Backend call failed: {}", err);
        Err(err)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&'static str, String)],
    ) -> Result<T, ServiceError> {
        let response = self
            .request(Method::GET, url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| log_transport(url, e))?;
        let response = Self::check(response, url).await?;
        response.json::<T>().await.map_err(|e| log_transport(url, e))
    }

    /// GET with automatic retry on network and timeout failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Vec<(&'static str, String)>,
    ) -> Result<T, ServiceError> {
        let url = self.endpoint(segments)?;
        let url = &url;
        let query = query.as_slice();
        with_retry(&self.retry, TransportRetryPolicy, move || {
            self.fetch_json::<T>(url, query)
        })
        .await
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<Response, ServiceError> {
        let url = self.endpoint(segments)?;
        let mut builder = self.request(method.clone(), url.clone()).query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        debug!(method = %method, path = url.path(), "Sending backend request");
        let response = builder.send().await.map_err(|e| log_transport(&url, e))?;
        Self::check(response, &url).await
    }

    async fn send_for_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self.send(method, segments, &[], Some(body)).await?;
        response.json::<T>().await.map_err(ServiceError::from)
    }
}

fn log_transport(url: &Url, err: reqwest::Error) -> ServiceError {
    let err = ServiceError::from(err);
    error!(path = url.path(), kind = %err.kind(), "Backend transport failure: {}", err);
    err
}

fn scope_query(scope: &HierarchyScope) -> Vec<(&'static str, String)> {
    [
        ("companyId", &scope.company_id),
        ("customerId", &scope.customer_id),
        ("projectId", &scope.project_id),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
    .collect()
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    #[instrument(skip(self))]
    async fn list_companies(&self) -> Result<Vec<Company>, ServiceError> {
        let page: ListResponse<Company> = self.get_json(&["companies"], Vec::new()).await?;
        Ok(page.into_items())
    }

    #[instrument(skip(self))]
    async fn list_customers(&self, scope: &HierarchyScope) -> Result<Vec<Customer>, ServiceError> {
        let page: ListResponse<Customer> =
            self.get_json(&["customers"], scope_query(scope)).await?;
        Ok(page.into_items())
    }

    #[instrument(skip(self))]
    async fn list_projects(&self, scope: &HierarchyScope) -> Result<Vec<Project>, ServiceError> {
        let page: ListResponse<Project> = self.get_json(&["projects"], scope_query(scope)).await?;
        Ok(page.into_items())
    }

    #[instrument(skip(self))]
    async fn list_work_orders(
        &self,
        scope: &HierarchyScope,
    ) -> Result<Vec<WorkOrder>, ServiceError> {
        let page: ListResponse<WorkOrder> =
            self.get_json(&["work-orders"], scope_query(scope)).await?;
        Ok(page.into_items())
    }

    #[instrument(skip(self))]
    async fn list_catalog(
        &self,
        warehouse_id: &WarehouseId,
    ) -> Result<Vec<CatalogItem>, ServiceError> {
        let page: ListResponse<CatalogItem> = self
            .get_json(&["warehouses", warehouse_id.as_str(), "items"], Vec::new())
            .await?;
        Ok(page.into_items())
    }

    #[instrument(skip(self))]
    async fn list_transfers(
        &self,
        query: &TransferQuery,
    ) -> Result<Vec<TransferSummary>, ServiceError> {
        let page: ListResponse<TransferDto> = self
            .get_json(&["transfer-requests"], query.query_pairs())
            .await?;
        Ok(page
            .into_items()
            .into_iter()
            .map(TransferDto::into_summary)
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_transfer(&self, id: &TransferId) -> Result<TransferDetail, ServiceError> {
        let dto: TransferDto = self
            .get_json(&["transfer-requests", id.as_str()], Vec::new())
            .await?;
        Ok(dto.into_detail())
    }

    #[instrument(skip(self, request), fields(recipient = %request.recipient_id))]
    async fn create_transfer(
        &self,
        request: &CreateTransferRequest,
    ) -> Result<TransferSummary, ServiceError> {
        let dto: TransferDto = self
            .send_for_json(Method::POST, &["transfer-requests"], request)
            .await?;
        Ok(dto.into_summary())
    }

    #[instrument(skip(self, request))]
    async fn accept_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        request: &AcceptTransferRequest,
    ) -> Result<(), ServiceError> {
        self.send(
            Method::PUT,
            &["transfer-requests", id.as_str(), "accept"],
            &[("recipientId", recipient_id.to_string())],
            Some(request),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, reason))]
    async fn reject_transfer(
        &self,
        id: &TransferId,
        recipient_id: &UserId,
        reason: &str,
    ) -> Result<(), ServiceError> {
        let body = RejectTransferBody {
            recipient_id: recipient_id.clone(),
            reason: reason.to_string(),
        };
        self.send(
            Method::DELETE,
            &["transfer-requests", id.as_str()],
            &[("recipientId", recipient_id.to_string())],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cancel_transfer(
        &self,
        id: &TransferId,
        sender_id: &UserId,
    ) -> Result<(), ServiceError> {
        self.send::<()>(
            Method::DELETE,
            &["transfer-requests", id.as_str()],
            &[("senderId", sender_id.to_string())],
            None,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, payload), fields(items = payload.items.len()))]
    async fn create_borrow_request(
        &self,
        payload: &BorrowRequestPayload,
    ) -> Result<BorrowRequestReceipt, ServiceError> {
        self.send_for_json(Method::POST, &["borrow-requests"], payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpInventoryApi {
        HttpInventoryApi::new(base, Some("secret".into()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let nested = api("https://inventory.example.com/api/v1/");
        let url = nested
            .endpoint(&["transfer-requests", "TR-100", "accept"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://inventory.example.com/api/v1/transfer-requests/TR-100/accept"
        );

        let bare = api("https://inventory.example.com");
        assert_eq!(
            bare.endpoint(&["companies"]).unwrap().as_str(),
            "https://inventory.example.com/companies"
        );
    }

    #[test]
    fn endpoint_escapes_segments() {
        let url = api("https://inventory.example.com/")
            .endpoint(&["warehouses", "W 1/B", "items"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://inventory.example.com/warehouses/W%201%2FB/items"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            HttpInventoryApi::new("not a url", None, Duration::from_secs(1)),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(matches!(
            HttpInventoryApi::new("mailto:ops@example.com", None, Duration::from_secs(1)),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn scope_query_skips_unselected_levels() {
        let scope = HierarchyScope {
            company_id: Some("C1".into()),
            customer_id: None,
            project_id: Some("P1".into()),
        };
        assert_eq!(
            scope_query(&scope),
            vec![("companyId", "C1".to_string()), ("projectId", "P1".to_string())]
        );
    }
}
