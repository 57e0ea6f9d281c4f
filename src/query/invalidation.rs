//! The invalidation table: which cached queries each write makes stale.
//!
//! Every rule lives in [`Mutation::invalidates`], so the whole contract can
//! be read and tested in one place.

use std::fmt;

use super::key::QueryKey;
use crate::resources::{Resource, CRM_ROOT};

/// Identity of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
  Create(Resource),
  Update(Resource, u64),
  Delete(Resource, u64),
  /// Checkout of a sales transaction, possibly for a new customer
  CompleteSale,
  /// Generate a report export. Changes no server state.
  ExportReport(Resource),
}

impl Mutation {
  pub fn resource(&self) -> Resource {
    match self {
      Mutation::Create(r) | Mutation::Update(r, _) | Mutation::Delete(r, _) => *r,
      Mutation::ExportReport(r) => *r,
      Mutation::CompleteSale => Resource::Sales,
    }
  }

  /// Actions that intentionally invalidate nothing.
  pub fn is_read_only(&self) -> bool {
    matches!(self, Mutation::ExportReport(_))
  }

  /// Key prefixes to mark stale once this mutation succeeds.
  pub fn invalidates(&self) -> Vec<QueryKey> {
    match self {
      Mutation::Create(resource) => collection_keys(*resource),
      Mutation::Update(resource, id) | Mutation::Delete(resource, id) => {
        let mut keys = collection_keys(*resource);
        keys.push(resource.detail_key(*id));
        keys
      }
      Mutation::CompleteSale => vec![
        Resource::Sales.root(),
        QueryKey::new(CRM_ROOT),
        Resource::Products.root(),
      ],
      Mutation::ExportReport(_) => Vec::new(),
    }
  }
}

fn collection_keys(resource: Resource) -> Vec<QueryKey> {
  let mut keys = vec![resource.lists(), resource.analytics_key()];
  keys.extend(resource.dependent_keys());
  keys
}

impl fmt::Display for Mutation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mutation::Create(r) => write!(f, "create {}", r),
      Mutation::Update(r, id) => write!(f, "update {} #{}", r, id),
      Mutation::Delete(r, id) => write!(f, "delete {} #{}", r, id),
      Mutation::CompleteSale => f.write_str("complete sale"),
      Mutation::ExportReport(r) => write!(f, "export {}", r),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::Params;

  fn all_mutations() -> Vec<Mutation> {
    let mut all = vec![Mutation::CompleteSale];
    for r in Resource::ALL {
      all.extend([
        Mutation::Create(r),
        Mutation::Update(r, 1),
        Mutation::Delete(r, 1),
        Mutation::ExportReport(r),
      ]);
    }
    all
  }

  #[test]
  fn test_every_write_declares_invalidations() {
    for mutation in all_mutations() {
      assert_eq!(
        mutation.invalidates().is_empty(),
        mutation.is_read_only(),
        "{}",
        mutation
      );
    }
  }

  #[test]
  fn test_update_supplier() {
    let keys = Mutation::Update(Resource::Suppliers, 7).invalidates();
    assert_eq!(
      keys,
      vec![
        QueryKey::new("suppliers").segment("list"),
        QueryKey::new("suppliers").segment("analytics"),
        QueryKey::new("suppliers").segment("detail").id(7),
      ]
    );
  }

  #[test]
  fn test_complete_sale_invalidates_all_crm_keys() {
    let keys = Mutation::CompleteSale.invalidates();
    let covered = |key: &QueryKey| keys.iter().any(|prefix| key.starts_with(prefix));

    for crm in [Resource::Contacts, Resource::Leads, Resource::Segments] {
      assert!(covered(&crm.list_key(Params::new().with("page", 3u32))));
      assert!(covered(&crm.detail_key(12)));
    }
    assert!(covered(&Resource::Sales.list_key(None::<Params>)));
    assert!(!covered(&Resource::Invoices.lists()));
  }

  #[test]
  fn test_payment_refreshes_invoices() {
    let keys = Mutation::Create(Resource::Payments).invalidates();
    assert!(keys.contains(&Resource::Invoices.root()));
  }

  #[test]
  fn test_detail_of_other_records_untouched() {
    let keys = Mutation::Delete(Resource::Suppliers, 2).invalidates();
    let other = Resource::Suppliers.detail_key(3);
    assert!(!keys.iter().any(|prefix| other.starts_with(prefix)));
  }
}
