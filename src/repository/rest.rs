//! REST implementation of the reservation store
//!
//! Talks to the external facilities server's JSON API. Transport errors and
//! unexpected statuses surface as retryable `Persistence` errors; a 404 on a
//! targeted operation maps to `NotFound`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use uuid::Uuid;

use crate::{
    config::BackendConfig,
    error::{CoreError, CoreResult},
    models::{ReservableResource, Reservation, ResourceKind},
};

use super::ReservationStore;

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    pub fn new(config: &BackendConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-success statuses, treating 404 as a missing record
    async fn check(response: Response, target: Option<Uuid>) -> CoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = target {
                return Err(CoreError::NotFound(id));
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(CoreError::Persistence(format!(
            "backend returned {}: {}",
            status, body
        )))
    }
}

fn kind_param(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Room => "ROOM",
        ResourceKind::ParkingSpace => "PARKING_SPACE",
    }
}

#[async_trait]
impl ReservationStore for RestStore {
    async fn list_resources(
        &self,
        kind: Option<ResourceKind>,
    ) -> CoreResult<Vec<ReservableResource>> {
        let mut request = self.client.get(self.url("/resources"));
        if let Some(kind) = kind {
            request = request.query(&[("kind", kind_param(kind))]);
        }
        let response = Self::check(request.send().await?, None).await?;
        Ok(response.json().await?)
    }

    async fn list_reservations(
        &self,
        resource_id: Option<String>,
    ) -> CoreResult<Vec<Reservation>> {
        let mut request = self.client.get(self.url("/reservations"));
        if let Some(id) = resource_id {
            request = request.query(&[("resource_id", id)]);
        }
        let response = Self::check(request.send().await?, None).await?;
        Ok(response.json().await?)
    }

    async fn create_reservation(&self, reservation: &Reservation) -> CoreResult<Reservation> {
        let response = self
            .client
            .post(self.url("/reservations"))
            .json(reservation)
            .send()
            .await?;
        let response = Self::check(response, None).await?;
        Ok(response.json().await?)
    }

    async fn update_reservation(&self, reservation: &Reservation) -> CoreResult<Reservation> {
        let response = self
            .client
            .put(self.url(&format!("/reservations/{}", reservation.id)))
            .json(reservation)
            .send()
            .await?;
        let response = Self::check(response, Some(reservation.id)).await?;
        Ok(response.json().await?)
    }

    async fn delete_reservation(&self, reservation_id: Uuid) -> CoreResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/reservations/{}", reservation_id)))
            .send()
            .await?;
        Self::check(response, Some(reservation_id)).await?;
        Ok(())
    }
}
