//! Per-resource read and write hooks bound to one client and one cache.

use serde_json::Value;
use tracing::info;

use super::catalog::Resource;
use super::record::Record;
use crate::api::{ApiClient, Page};
use crate::error::{ApiError, Result};
use crate::query::{Mutation, MutationHook, Params, QueryCache, QueryObserver};

/// Input for an update: the record id and the fields to change.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
  pub id: u64,
  pub body: Value,
}

/// Hook factory for every [`Resource`].
///
/// Cheap to clone. All hooks created from one `Hooks` share its cache.
#[derive(Debug, Clone)]
pub struct Hooks {
  client: ApiClient,
  cache: QueryCache,
}

impl Hooks {
  pub fn new(client: ApiClient, cache: QueryCache) -> Self {
    Self { client, cache }
  }

  pub fn client(&self) -> &ApiClient {
    &self.client
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Paginated list, keyed by its query parameters.
  pub fn use_list(&self, resource: Resource, params: Option<Params>) -> QueryObserver<Page<Record>> {
    let key = resource.list_key(params.clone());
    let query = params.map(|p| p.to_query_pairs()).unwrap_or_default();
    let client = self.client.clone();
    QueryObserver::new(self.cache.clone(), key, move || {
      let client = client.clone();
      let query = query.clone();
      async move {
        client
          .get::<Page<Record>>(resource.path(), &query)
          .await?
          .into_data()
      }
    })
  }

  /// One record. Disabled until an id is known.
  pub fn use_detail(&self, resource: Resource, id: Option<u64>) -> QueryObserver<Record> {
    let Some(id) = id else {
      let key = resource.root().segment("detail");
      return QueryObserver::with_enabled(self.cache.clone(), key, false, || async {
        Err::<Record, _>(ApiError::Cancelled)
      });
    };

    let client = self.client.clone();
    QueryObserver::new(self.cache.clone(), resource.detail_key(id), move || {
      let client = client.clone();
      async move {
        client
          .get::<Record>(&resource.detail_path(id), &[])
          .await?
          .into_data()
      }
    })
  }

  /// Dashboard figures for a resource. The shape is endpoint-specific.
  pub fn use_analytics(&self, resource: Resource) -> QueryObserver<Value> {
    let client = self.client.clone();
    QueryObserver::new(self.cache.clone(), resource.analytics_key(), move || {
      let client = client.clone();
      async move {
        client
          .get::<Value>(&resource.analytics_path(), &[])
          .await?
          .into_data()
      }
    })
  }

  pub fn use_create(&self, resource: Resource) -> MutationHook<Value, Record> {
    let client = self.client.clone();
    MutationHook::new(
      self.cache.clone(),
      move |_: &Value| Mutation::Create(resource),
      move |body: Value| {
        let client = client.clone();
        async move { client.post::<Record, _>(resource.path(), &body).await?.into_data() }
      },
    )
  }

  pub fn use_update(&self, resource: Resource) -> MutationHook<Update, Record> {
    let client = self.client.clone();
    MutationHook::new(
      self.cache.clone(),
      move |input: &Update| Mutation::Update(resource, input.id),
      move |input: Update| {
        let client = client.clone();
        async move {
          client
            .put::<Record, _>(&resource.detail_path(input.id), &input.body)
            .await?
            .into_data()
        }
      },
    )
  }

  /// Resolves to the server's confirmation message, if any.
  pub fn use_delete(&self, resource: Resource) -> MutationHook<u64, Option<String>> {
    let client = self.client.clone();
    MutationHook::new(
      self.cache.clone(),
      move |id: &u64| Mutation::Delete(resource, *id),
      move |id: u64| {
        let client = client.clone();
        async move {
          client
            .delete::<Value>(&resource.detail_path(id))
            .await?
            .into_ack()
        }
      },
    )
  }

  /// Checkout. Refreshes sales, every CRM query and product stock.
  pub fn use_complete_sale(&self) -> MutationHook<Value, Record> {
    let client = self.client.clone();
    MutationHook::new(
      self.cache.clone(),
      |_: &Value| Mutation::CompleteSale,
      move |body: Value| {
        let client = client.clone();
        async move {
          client
            .post::<Record, _>(Resource::Sales.path(), &body)
            .await?
            .into_data()
        }
      },
    )
  }

  /// Server-generated report. Read-only, so nothing is invalidated.
  pub fn use_export(&self, resource: Resource) -> MutationHook<Params, Value> {
    let client = self.client.clone();
    MutationHook::new(
      self.cache.clone(),
      move |_: &Params| Mutation::ExportReport(resource),
      move |params: Params| {
        let client = client.clone();
        async move {
          client
            .get::<Value>(&resource.export_path(), &params.to_query_pairs())
            .await?
            .into_data()
        }
      },
    )
  }

  /// Forget the session token and drop all cached data.
  pub fn logout(&self) -> Result<()> {
    self.client.session().logout()?;
    let cleared = self.cache.clear();
    info!(cleared, "logged out");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::Session;

  fn hooks() -> Hooks {
    let client = ApiClient::with_client(
      reqwest::Client::new(),
      "http://127.0.0.1:9/api",
      Session::in_memory(),
    )
    .unwrap();
    Hooks::new(client, QueryCache::default())
  }

  #[tokio::test]
  async fn test_detail_without_id_is_disabled() {
    let hooks = hooks();
    let detail = hooks.use_detail(Resource::Suppliers, None);

    assert!(!detail.is_enabled());
    assert_eq!(detail.resolve().await.unwrap(), None);
    let result = detail.result();
    assert!(result.data.is_none());
    assert!(result.error.is_none());
    assert!(!result.is_loading);

    assert!(hooks.cache().is_empty());
    assert_eq!(hooks.cache().invalidate(&Resource::Suppliers.root()), 0);
  }

  #[tokio::test]
  async fn test_list_key_includes_params() {
    let hooks = hooks();
    let a = hooks.use_list(
      Resource::Suppliers,
      Some(Params::new().with("page", 1u32).with("q", "acme")),
    );
    let b = hooks.use_list(
      Resource::Suppliers,
      Some(Params::new().with("q", "acme").with("page", 1u32)),
    );
    let c = hooks.use_list(Resource::Suppliers, Some(Params::new()));
    let d = hooks.use_list(Resource::Suppliers, None);

    assert_eq!(a.key(), b.key());
    assert_eq!(c.key(), d.key());
    assert_ne!(a.key(), d.key());
  }

  #[tokio::test]
  async fn test_logout_clears_session_and_cache() {
    let hooks = hooks();
    hooks.client().session().login("secret").unwrap();
    hooks.cache().set_data(&Resource::Products.lists(), 1u8);

    hooks.logout().unwrap();

    assert!(!hooks.client().session().is_authenticated());
    assert!(hooks.cache().is_empty());
  }
}
