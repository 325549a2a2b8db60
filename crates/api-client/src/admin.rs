//! Typed admin endpoints.

use crate::client::ApiClient;
use crate::error::Result;
use crate::models::{
    ActivateRequest, ActivateResponse, Activity, Feature, LoginRequest, LoginResponse, Package,
    PackagePayload, Payment, Stats, User, UsersResponse,
};

impl ApiClient {
    #[must_use]
    pub fn package_path(id: u64) -> String {
        format!("/packages/{id}")
    }

    #[must_use]
    pub fn user_path(id: u64) -> String {
        format!("/users/{id}")
    }

    /// Authenticate and persist the returned bearer token for subsequent
    /// requests on this client.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let response: LoginResponse = self.post_json("/admin/login", request).await?;
        self.tokens().persist_token(&response.token);
        Ok(response)
    }

    pub async fn payments(&self) -> Result<Vec<Payment>> {
        self.get_json("/admin/payments").await
    }

    pub async fn activate_payment(&self, request: &ActivateRequest) -> Result<ActivateResponse> {
        self.post_json("/admin/activate", request).await
    }

    pub async fn packages(&self) -> Result<Vec<Package>> {
        self.get_json("/packages").await
    }

    pub async fn create_package(&self, payload: &PackagePayload) -> Result<Package> {
        self.post_json("/packages", payload).await
    }

    pub async fn update_package(&self, id: u64, payload: &PackagePayload) -> Result<Package> {
        self.put_json(Self::package_path(id).as_str(), payload).await
    }

    pub async fn delete_package(&self, id: u64) -> Result<()> {
        self.delete(Self::package_path(id).as_str()).await
    }

    pub async fn users(&self) -> Result<UsersResponse> {
        self.get_json("/users").await
    }

    pub async fn user(&self, id: u64) -> Result<User> {
        self.get_json(Self::user_path(id).as_str()).await
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.get_json("/stats").await
    }

    pub async fn monthly_stats(&self) -> Result<Stats> {
        self.get_json("/stats/monthly").await
    }

    pub async fn recent_activities(&self) -> Result<Vec<Activity>> {
        self.get_json("/stats/activities").await
    }

    pub async fn features(&self) -> Result<Vec<Feature>> {
        self.get_json("/feature").await
    }
}
