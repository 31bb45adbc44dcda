//! HTTP transport for the query and bulk protocols
//!
//! The engine talks to the server through the `Transport` trait so the
//! state machines can be exercised against an in-process stub; the real
//! implementation is a thin reqwest wrapper sharing one client.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::errors::GridError;
use crate::protocol::{BulkReply, FilterQuery, FilterReply, FormPayload};

/// Path parameters of the bulk-removal endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalRoute {
    /// Kind of the rows being removed
    pub kind: String,
    pub owner_kind: String,
    pub owner_id: u64,
    /// Column on the target rows pointing back at the owner
    pub to_key: String,
    /// Owner-side collection the rows are removed from
    pub from_key: String,
}

impl RemovalRoute {
    pub fn path(&self) -> String {
        format!(
            "/bulk_removal/{}/{}/{}/{}/{}",
            self.kind, self.owner_kind, self.owner_id, self.to_key, self.from_key
        )
    }
}

/// Server endpoints the engine depends on
pub trait Transport: Send + Sync {
    fn filtering(
        &self,
        target: &str,
        query: FilterQuery,
    ) -> BoxFuture<'static, Result<FilterReply, GridError>>;

    fn bulk_deletion(
        &self,
        kind: &str,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>>;

    fn bulk_removal(
        &self,
        route: RemovalRoute,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>>;

    fn bulk_edit(
        &self,
        kind: &str,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>>;
}

/// Production transport over reqwest
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, GridError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| GridError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post<Body, Reply>(&self, path: String, body: Body) -> BoxFuture<'static, Result<Reply, GridError>>
    where
        Body: serde::Serialize + Send + 'static,
        Reply: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        let url = format!("{}{}", self.base_url, path);
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|error| GridError::Transport(error.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(GridError::Transport(format!("{}: {}", status, text)));
            }
            response
                .json::<Reply>()
                .await
                .map_err(|error| GridError::Transport(error.to_string()))
        })
    }

    fn post_bulk(
        &self,
        path: String,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
        let inner = self.post::<FormPayload, BulkReply>(path, form);
        Box::pin(async move {
            inner.await.map_err(|error| match error {
                // A failed bulk request is a bulk-operation error, not a
                // generic transport one: the caller leaves the grid untouched
                GridError::Transport(message) => GridError::BulkOperation(message),
                other => other,
            })
        })
    }
}

impl Transport for HttpTransport {
    fn filtering(
        &self,
        target: &str,
        query: FilterQuery,
    ) -> BoxFuture<'static, Result<FilterReply, GridError>> {
        self.post(format!("/filtering/{}", target), query)
    }

    fn bulk_deletion(
        &self,
        kind: &str,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
        self.post_bulk(format!("/bulk_deletion/{}", kind), form)
    }

    fn bulk_removal(
        &self,
        route: RemovalRoute,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
        self.post_bulk(route.path(), form)
    }

    fn bulk_edit(
        &self,
        kind: &str,
        form: FormPayload,
    ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
        self.post_bulk(format!("/bulk_edit/{}", kind), form)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Counting stub transport used by the engine tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Transport returning canned replies and counting every call
    pub struct StubTransport {
        pub fetches: AtomicUsize,
        pub bulk_calls: AtomicUsize,
        /// Queries seen by `filtering`, most recent last
        pub queries: Mutex<Vec<(String, FilterQuery)>>,
        /// Routes seen by `bulk_removal`
        pub removal_routes: Mutex<Vec<RemovalRoute>>,
        /// Next reply for `filtering` (cloned per call)
        pub reply: Mutex<FilterReply>,
        pub bulk_reply: Mutex<Result<BulkReply, GridError>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                bulk_calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
                removal_routes: Mutex::new(Vec::new()),
                reply: Mutex::new(FilterReply::default()),
                bulk_reply: Mutex::new(Ok(BulkReply { count: 0 })),
            }
        }

        pub fn set_reply(&self, reply: FilterReply) {
            *self.reply.lock().unwrap() = reply;
        }

        pub fn set_bulk_reply(&self, reply: Result<BulkReply, GridError>) {
            *self.bulk_reply.lock().unwrap() = reply;
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub fn last_query(&self) -> Option<FilterQuery> {
            self.queries.lock().unwrap().last().map(|(_, q)| q.clone())
        }

        pub fn last_target(&self) -> Option<String> {
            self.queries.lock().unwrap().last().map(|(t, _)| t.clone())
        }
    }

    impl Transport for StubTransport {
        fn filtering(
            &self,
            target: &str,
            query: FilterQuery,
        ) -> BoxFuture<'static, Result<FilterReply, GridError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.queries
                .lock()
                .unwrap()
                .push((target.to_string(), query));
            let reply = self.reply.lock().unwrap().clone();
            Box::pin(async move { Ok(reply) })
        }

        fn bulk_deletion(
            &self,
            _kind: &str,
            _form: FormPayload,
        ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.bulk_reply.lock().unwrap().clone();
            Box::pin(async move { reply })
        }

        fn bulk_removal(
            &self,
            route: RemovalRoute,
            _form: FormPayload,
        ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            self.removal_routes.lock().unwrap().push(route);
            let reply = self.bulk_reply.lock().unwrap().clone();
            Box::pin(async move { reply })
        }

        fn bulk_edit(
            &self,
            _kind: &str,
            _form: FormPayload,
        ) -> BoxFuture<'static, Result<BulkReply, GridError>> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.bulk_reply.lock().unwrap().clone();
            Box::pin(async move { reply })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_route_path() {
        let route = RemovalRoute {
            kind: "device".to_string(),
            owner_kind: "pool".to_string(),
            owner_id: 7,
            to_key: "pools".to_string(),
            from_key: "devices".to_string(),
        };
        assert_eq!(route.path(), "/bulk_removal/device/pool/7/pools/devices");
    }
}
