//! Subcommands of the `bizdesk` binary.

use bizdesk::config::Config;
use bizdesk::query::{Params, QueryObserver, QueryState};
use bizdesk::resources::{Hooks, Record, Resource, Update};
use bizdesk::views::{self, percentile, summarize, tally, ExportFormat, Fields, PageInfo, SortSpec, ViewState};
use clap::{Args, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Store a session token for later commands
  Login {
    #[arg(long)]
    token: String,
  },
  /// Forget the stored session token
  Logout,
  /// List records with local search, filters, sorting and paging
  List(ListArgs),
  /// Show one record
  Get { resource: Resource, id: u64 },
  /// Create a record from a JSON object
  Create {
    resource: Resource,
    #[arg(long)]
    data: String,
  },
  /// Update a record with the fields of a JSON object
  Update {
    resource: Resource,
    id: u64,
    #[arg(long)]
    data: String,
  },
  /// Delete a record
  Delete { resource: Resource, id: u64 },
  /// Re-fetch a list periodically and report each change until Ctrl-C
  Watch {
    resource: Resource,
    /// Seconds between refreshes
    #[arg(long, default_value_t = 30)]
    interval: u64,
  },
}

#[derive(Args, Debug)]
pub struct ListArgs {
  resource: Resource,

  /// Case-insensitive text search
  #[arg(short, long)]
  search: Option<String>,

  /// Equality filter such as status=active (repeatable)
  #[arg(short, long = "filter", value_parser = parse_key_value)]
  filters: Vec<(String, String)>,

  /// Field to sort by
  #[arg(long)]
  sort: Option<String>,

  /// Sort descending
  #[arg(long)]
  desc: bool,

  #[arg(long, default_value_t = 1)]
  page: usize,

  /// Rows per page (default from config)
  #[arg(long)]
  per_page: Option<usize>,

  /// Server-side page to fetch
  #[arg(long)]
  remote_page: Option<u64>,

  /// Write every matching row as csv or json instead of a table
  #[arg(long)]
  export: Option<ExportFormat>,

  /// Summarize one field over the matching rows
  #[arg(long)]
  stats: Option<String>,

  /// Columns to show (comma separated)
  #[arg(long, value_delimiter = ',')]
  columns: Vec<String>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
  let (key, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", s))?;
  if key.trim().is_empty() {
    return Err(format!("missing field name in '{}'", s));
  }
  Ok((key.trim().to_string(), value.trim().to_string()))
}

pub async fn run(command: Command, hooks: &Hooks, config: &Config) -> Result<()> {
  match command {
    Command::Login { token } => {
      hooks.client().session().login(token)?;
      hooks.cache().clear();
      println!("Logged in.");
    }
    Command::Logout => {
      hooks.logout()?;
      println!("Logged out.");
    }
    Command::List(args) => list(hooks, config, args).await?,
    Command::Get { resource, id } => {
      let record = load(&hooks.use_detail(resource, Some(id))).await?;
      print_json(&*record)?;
    }
    Command::Create { resource, data } => {
      let record = hooks.use_create(resource).mutate_async(parse_body(&data)?).await?;
      print_json(&record)?;
    }
    Command::Update { resource, id, data } => {
      let body = parse_body(&data)?;
      let record = hooks
        .use_update(resource)
        .mutate_async(Update { id, body })
        .await?;
      print_json(&record)?;
    }
    Command::Delete { resource, id } => {
      let message = hooks.use_delete(resource).mutate_async(id).await?;
      println!(
        "{}",
        message.unwrap_or_else(|| format!("Deleted {} #{}", resource, id))
      );
    }
    Command::Watch { resource, interval } => watch(hooks, resource, interval).await?,
  }
  Ok(())
}

async fn load<T: Send + Sync + 'static>(observer: &QueryObserver<T>) -> Result<Arc<T>> {
  observer
    .resolve()
    .await?
    .ok_or_else(|| eyre!("Query for {} is disabled", observer.key()))
}

fn parse_body(data: &str) -> Result<Value> {
  let body: Value = serde_json::from_str(data).map_err(|e| eyre!("Invalid --data JSON: {}", e))?;
  if !body.is_object() {
    return Err(eyre!("--data must be a JSON object"));
  }
  Ok(body)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn list(hooks: &Hooks, config: &Config, args: ListArgs) -> Result<()> {
  let params = Params::new().with_opt("page", args.remote_page);
  let page = load(&hooks.use_list(args.resource, Some(params))).await?;
  debug!(resource = %args.resource, rows = page.len(), total = page.total, "list loaded");

  let per_page = args.per_page.unwrap_or(config.views.page_size);
  let mut state = ViewState::new(args.resource.search_fields(), per_page);
  if let Some(term) = &args.search {
    state.set_search(term.as_str());
  }
  for (field, value) in &args.filters {
    state.set_equals(field.as_str(), value.as_str());
  }
  if let Some(field) = &args.sort {
    state.sort = Some(if args.desc {
      SortSpec::desc(field.as_str())
    } else {
      SortSpec::asc(field.as_str())
    });
  }
  state.set_page(args.page);

  let view = state.apply(&page.data);
  let columns: Vec<&str> = if args.columns.is_empty() {
    args.resource.default_columns()
  } else {
    args.columns.iter().map(String::as_str).collect()
  };

  if let Some(field) = &args.stats {
    print_stats(&view.filtered, field);
    return Ok(());
  }
  match args.export {
    Some(format) => print!("{}", views::export(&view.filtered, &columns, format)?),
    None => print_table(view.rows(), &columns, &view.page),
  }
  Ok(())
}

fn print_table(rows: &[&Record], columns: &[&str], info: &PageInfo) {
  println!("{}", columns.join("\t"));
  for row in rows {
    let cells: Vec<String> = columns
      .iter()
      .map(|c| row.field(c).map(|v| v.to_display()).unwrap_or_default())
      .collect();
    println!("{}", cells.join("\t"));
  }
  match info.item_range() {
    Some((first, last)) => println!(
      "-- {}-{} of {} (page {}/{})",
      first,
      last,
      info.total,
      info.page,
      info.total_pages()
    ),
    None => println!("-- no matching records"),
  }
}

/// Numeric summary when the field is numeric, otherwise a tally of its values.
fn print_stats(rows: &[&Record], field: &str) {
  let summary = summarize(rows, field);
  if summary.count == 0 {
    for (value, count) in tally(rows, field) {
      println!("{}\t{}", value, count);
    }
    return;
  }

  let values: Vec<f64> = rows
    .iter()
    .filter_map(|row| row.field(field).and_then(|v| v.as_number()))
    .collect();
  println!("count\t{}", summary.count);
  println!("sum\t{}", summary.sum);
  if let (Some(min), Some(max)) = (summary.min, summary.max) {
    println!("min\t{}", min);
    println!("max\t{}", max);
  }
  if let Some(mean) = summary.mean() {
    println!("mean\t{:.2}", mean);
  }
  for p in [50.0, 90.0] {
    if let Some(value) = percentile(&values, p) {
      println!("p{}\t{}", p, value);
    }
  }
}

async fn watch(hooks: &Hooks, resource: Resource, interval: u64) -> Result<()> {
  let mut observer = hooks
    .use_list(resource, None)
    .with_refetch_interval(Duration::from_secs(interval.max(1)));
  observer.fetch();

  loop {
    tokio::select! {
      changed = observer.changed() => {
        if !changed {
          break;
        }
        if observer.is_fetching() {
          continue;
        }
        let now = chrono::Local::now().format("%H:%M:%S");
        match observer.state() {
          QueryState::Success(page) => println!("{} {}: {} records", now, resource, page.total),
          QueryState::Error { error, stale } => {
            let shown = stale.map(|page| page.total).unwrap_or(0);
            eprintln!("{} refresh failed ({} records shown): {}", now, shown, error);
          }
          QueryState::Loading | QueryState::Idle => {}
        }
      }
      _ = tokio::signal::ctrl_c() => break,
    }
  }
  Ok(())
}
