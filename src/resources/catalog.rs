use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::query::{Params, QueryKey};

/// Every backend resource the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
  // Inventory
  Suppliers,
  Products,
  StockMovements,
  // Invoicing
  Invoices,
  Payments,
  // CRM
  Contacts,
  Leads,
  Segments,
  // HR
  Employees,
  LeaveRequests,
  // Projects
  Projects,
  ProjectTasks,
  // Finance
  Expenses,
  Accounts,
  // Sales
  Sales,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown resource '{0}'")]
pub struct UnknownResource(pub String);

/// Key root shared by all CRM resources.
pub const CRM_ROOT: &str = "crm";

impl Resource {
  pub const ALL: [Resource; 15] = [
    Resource::Suppliers,
    Resource::Products,
    Resource::StockMovements,
    Resource::Invoices,
    Resource::Payments,
    Resource::Contacts,
    Resource::Leads,
    Resource::Segments,
    Resource::Employees,
    Resource::LeaveRequests,
    Resource::Projects,
    Resource::ProjectTasks,
    Resource::Expenses,
    Resource::Accounts,
    Resource::Sales,
  ];

  /// Short name used on the command line and in cache keys.
  pub fn name(&self) -> &'static str {
    match self {
      Resource::Suppliers => "suppliers",
      Resource::Products => "products",
      Resource::StockMovements => "stock-movements",
      Resource::Invoices => "invoices",
      Resource::Payments => "payments",
      Resource::Contacts => "contacts",
      Resource::Leads => "leads",
      Resource::Segments => "segments",
      Resource::Employees => "employees",
      Resource::LeaveRequests => "leave-requests",
      Resource::Projects => "projects",
      Resource::ProjectTasks => "project-tasks",
      Resource::Expenses => "expenses",
      Resource::Accounts => "accounts",
      Resource::Sales => "sales",
    }
  }

  /// REST collection path, relative to the API base URL.
  pub fn path(&self) -> &'static str {
    match self {
      Resource::Suppliers => "inventory/suppliers",
      Resource::Products => "inventory/products",
      Resource::StockMovements => "inventory/stock-movements",
      Resource::Invoices => "invoices",
      Resource::Payments => "payments",
      Resource::Contacts => "crm/contacts",
      Resource::Leads => "crm/leads",
      Resource::Segments => "crm/segments",
      Resource::Employees => "hr/employees",
      Resource::LeaveRequests => "hr/leave-requests",
      Resource::Projects => "projects",
      Resource::ProjectTasks => "project-tasks",
      Resource::Expenses => "finance/expenses",
      Resource::Accounts => "finance/accounts",
      Resource::Sales => "sales",
    }
  }

  pub fn is_crm(&self) -> bool {
    matches!(self, Resource::Contacts | Resource::Leads | Resource::Segments)
  }

  /// Prefix covering every key of this resource.
  ///
  /// CRM resources nest under a shared `crm` root so the whole domain can
  /// be invalidated at once.
  pub fn root(&self) -> QueryKey {
    if self.is_crm() {
      QueryKey::new(CRM_ROOT).segment(self.name())
    } else {
      QueryKey::new(self.name())
    }
  }

  /// Prefix covering every list query of this resource, whatever its params.
  pub fn lists(&self) -> QueryKey {
    self.root().segment("list")
  }

  pub fn list_key(&self, params: impl Into<Option<Params>>) -> QueryKey {
    self.lists().params(params)
  }

  pub fn detail_key(&self, id: u64) -> QueryKey {
    self.root().segment("detail").id(id)
  }

  pub fn analytics_key(&self) -> QueryKey {
    self.root().segment("analytics")
  }

  pub fn detail_path(&self, id: u64) -> String {
    format!("{}/{}", self.path(), id)
  }

  pub fn analytics_path(&self) -> String {
    format!("{}/analytics", self.path())
  }

  pub fn export_path(&self) -> String {
    format!("{}/export", self.path())
  }

  /// Keys of other resources whose server state changes when this one is written.
  pub fn dependent_keys(&self) -> Vec<QueryKey> {
    match self {
      Resource::StockMovements => vec![Resource::Products.root()],
      Resource::Payments => vec![Resource::Invoices.root()],
      Resource::LeaveRequests => vec![Resource::Employees.root()],
      Resource::ProjectTasks => vec![Resource::Projects.root()],
      Resource::Expenses => vec![Resource::Accounts.root()],
      // A sale can create or update a customer and moves stock
      Resource::Sales => vec![QueryKey::new(CRM_ROOT), Resource::Products.root()],
      _ => Vec::new(),
    }
  }

  /// Text fields matched by free-text search.
  pub fn search_fields(&self) -> &'static [&'static str] {
    match self {
      Resource::Suppliers => &["name", "email", "phone", "contact_person"],
      Resource::Products => &["name", "sku", "category"],
      Resource::StockMovements => &["reference", "type", "notes"],
      Resource::Invoices => &["invoice_number", "customer_name", "status"],
      Resource::Payments => &["reference", "method", "status"],
      Resource::Contacts => &["name", "email", "phone", "company"],
      Resource::Leads => &["name", "email", "company", "source"],
      Resource::Segments => &["name", "description"],
      Resource::Employees => &["first_name", "last_name", "email", "department"],
      Resource::LeaveRequests => &["employee_name", "type", "status"],
      Resource::Projects => &["name", "client", "status"],
      Resource::ProjectTasks => &["title", "assignee", "status"],
      Resource::Expenses => &["description", "category", "vendor"],
      Resource::Accounts => &["name", "code", "type"],
      Resource::Sales => &["reference", "customer_name", "payment_method"],
    }
  }

  /// Columns shown and exported by default.
  pub fn default_columns(&self) -> Vec<&'static str> {
    let mut columns = vec!["id"];
    columns.extend_from_slice(self.search_fields());
    columns
  }
}

impl fmt::Display for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Resource {
  type Err = UnknownResource;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase().replace('_', "-");
    Resource::ALL
      .into_iter()
      .find(|r| r.name() == wanted)
      .ok_or_else(|| UnknownResource(s.to_string()))
  }
}
