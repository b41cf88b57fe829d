//! Record Store Client for the backend's collection API.
//!
//! Every operation is exactly one HTTP call (`full_list` is a loop of
//! `list` calls). Nothing is cached and nothing is retried; a non-2xx answer
//! becomes [`ClientError::Response`] with the status and the body's message.

use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::AuthStore,
    error::ClientError,
    model::{ListResult, User},
};

pub const SUPERUSERS: &str = "_superusers";
const FULL_LIST_BATCH: u32 = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub record: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
    /// e.g. `-created`
    pub sort: Option<String>,
    /// Backend filter expression, e.g. `email = "a@b.c"`.
    pub filter: Option<String>,
    /// Skip the total count query; totals come back as `-1`.
    pub skip_total: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 30,
            sort: None,
            filter: None,
            skip_total: false,
        }
    }
}

impl ListOptions {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("page", self.page.to_string()), ("perPage", self.per_page.to_string())];
        if let Some(sort) = &self.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(filter) = &self.filter {
            query.push(("filter", filter.clone()));
        }
        if self.skip_total {
            query.push(("skipTotal", "1".to_string()));
        }
        query
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone)]
pub struct PocketBase {
    base_url: String,
    http: reqwest::Client,
    auth: AuthStore,
}

impl PocketBase {
    /// Client with its own empty, in-memory auth store.
    pub fn new(base_url: &str) -> Self {
        Self::with_auth_store(base_url, AuthStore::new())
    }

    pub fn with_auth_store(base_url: &str, auth: AuthStore) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_store(&self) -> &AuthStore {
        &self.auth
    }

    pub fn collection(&self, name: &str) -> RecordService<'_> {
        RecordService {
            client: self,
            collection: name.to_string(),
        }
    }

    /// Authenticate as a superuser (admin) of the backend.
    pub async fn superuser_auth(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.collection(SUPERUSERS).auth_with_password(email, password).await
    }

    /// Push collection definitions through the import endpoint.
    pub async fn import_collections(&self, payload: &Value) -> Result<(), ClientError> {
        let request = self.request(Method::PUT, "/api/collections/import").json(payload);
        self.send(request).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match self.auth.token() {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, token),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.ok();
        let (message, data) = match body {
            Some(body) if !body.message.is_empty() => (body.message, body.data),
            Some(body) => (reason(status), body.data),
            None => (reason(status), Value::Null),
        };
        tracing::debug!(status = status.as_u16(), %message, "backend request failed");
        Err(ClientError::Response {
            status: status.as_u16(),
            message,
            data,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.send(request).await?.json::<T>().await?)
    }
}

fn reason(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Something went wrong while processing your request.")
        .to_string()
}

/// CRUD operations on one collection.
pub struct RecordService<'a> {
    client: &'a PocketBase,
    collection: String,
}

impl RecordService<'_> {
    fn records_path(&self) -> String {
        format!("/api/collections/{}/records", self.collection)
    }

    fn record_path(&self, id: &str) -> String {
        format!("/api/collections/{}/records/{id}", self.collection)
    }

    pub async fn list<T: DeserializeOwned>(&self, options: &ListOptions) -> Result<ListResult<T>, ClientError> {
        let request = self
            .client
            .request(Method::GET, &self.records_path())
            .query(&options.query());
        self.client.send_json(request).await
    }

    /// Every matching record, fetched page by page.
    pub async fn full_list<T: DeserializeOwned>(
        &self,
        sort: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<T>, ClientError> {
        let mut options = ListOptions::page(1, FULL_LIST_BATCH);
        options.sort = sort.map(str::to_string);
        options.filter = filter.map(str::to_string);
        options.skip_total = true;

        let mut items = Vec::new();
        loop {
            let page = self.list::<T>(&options).await?;
            let fetched = page.items.len();
            items.extend(page.items);
            if fetched < FULL_LIST_BATCH as usize {
                break;
            }
            options.page += 1;
        }
        Ok(items)
    }

    /// First record matching `filter`, or a 404 error when none does.
    pub async fn first_list_item<T: DeserializeOwned>(&self, filter: &str) -> Result<T, ClientError> {
        let mut options = ListOptions::page(1, 1).filter(filter);
        options.skip_total = true;
        self.list::<T>(&options)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Response {
                status: 404,
                message: "The requested resource wasn't found.".to_string(),
                data: Value::Null,
            })
    }

    pub async fn get_one<T: DeserializeOwned>(&self, id: &str) -> Result<T, ClientError> {
        let request = self.client.request(Method::GET, &self.record_path(id));
        self.client.send_json(request).await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(&self, body: &B) -> Result<T, ClientError> {
        let request = self.client.request(Method::POST, &self.records_path()).json(body);
        self.client.send_json(request).await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(&self, id: &str, body: &B) -> Result<T, ClientError> {
        let request = self.client.request(Method::PATCH, &self.record_path(id)).json(body);
        self.client.send_json(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let request = self.client.request(Method::DELETE, &self.record_path(id));
        self.client.send(request).await.map(|_| ())
    }

    /// Password login for an auth collection; the session lands in the
    /// client's auth store.
    pub async fn auth_with_password(&self, identity: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let request = self
            .client
            .request(Method::POST, &format!("/api/collections/{}/auth-with-password", self.collection))
            .json(&serde_json::json!({ "identity": identity, "password": password }));
        let auth: AuthResponse = self.client.send_json(request).await?;
        self.client.auth.save(auth.token.clone(), auth.record.clone());
        Ok(auth)
    }

    /// Exchange the current token for a fresh one.
    pub async fn auth_refresh(&self) -> Result<AuthResponse, ClientError> {
        let request = self
            .client
            .request(Method::POST, &format!("/api/collections/{}/auth-refresh", self.collection));
        let auth: AuthResponse = self.client.send_json(request).await?;
        self.client.auth.save(auth.token.clone(), auth.record.clone());
        Ok(auth)
    }
}

#[cfg(test)]
#[path = "pocketbase_test.rs"]
mod tests;
