use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_dashboard, load_settings, load_settings_from, Autocomplete, CollectionState,
    CollectionViewModel, HttpCollection, MutableCollection, Settings,
};
use serde_json::{json, Value};
use shared::{
    domain::{EntityId, Resource},
    search::SearchTerms,
};
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fleet", about = "Query and edit fleet maintenance records")]
struct Args {
    /// Settings file; defaults to ./fleet.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists every record of a resource.
    List { resource: Resource },
    /// Lists records matching field=value terms. Blank values are ignored.
    Search {
        resource: Resource,
        terms: Vec<String>,
    },
    Get { resource: Resource, id: EntityId },
    Create { resource: Resource, body: String },
    Update {
        resource: Resource,
        id: EntityId,
        body: String,
    },
    Delete { resource: Resource, id: EntityId },
    /// Runs a record action, e.g. `act bus 3 instalar pneu 7 posicao=TRASEIRO_DIREITO`.
    /// Arguments holding `=` become query parameters.
    Act {
        resource: Resource,
        id: EntityId,
        #[arg(required = true, num_args = 1..)]
        action: Vec<String>,
    },
    /// Type-ahead suggestions on one field.
    Suggest {
        resource: Resource,
        field: String,
        text: String,
    },
    /// Refetches a filter periodically and prints every state change.
    Watch {
        resource: Resource,
        terms: Vec<String>,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
    /// Home-page counters.
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = resolve_settings(&args)?;
    info!(base_url = %settings.base_url, "using fleet backend");

    run(args.command, &settings).await
}

fn resolve_settings(args: &Args) -> Result<Settings> {
    let settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    Ok(apply_flags(args, settings))
}

fn apply_flags(args: &Args, mut settings: Settings) -> Settings {
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(username) = &args.username {
        settings.username = Some(username.clone());
    }
    if let Some(password) = &args.password {
        settings.password = Some(password.clone());
    }
    settings
}

async fn run(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::List { resource } => {
            let view_model = CollectionViewModel::initialize(collection(settings, resource)?).await;
            print_data(&view_model.state())
        }
        Command::Search { resource, terms } => {
            let terms = parse_terms(resource, &terms)?;
            let view_model = CollectionViewModel::new(collection(settings, resource)?);
            view_model.search(terms).await;
            print_data(&view_model.state())
        }
        Command::Get { resource, id } => {
            let entity = collection(settings, resource)?.get_by_id(&id).await?;
            print_json(&serde_json::to_value(entity)?)
        }
        Command::Create { resource, body } => {
            let created = collection(settings, resource)?
                .create(&parse_body(&body)?)
                .await?;
            print_json(&serde_json::to_value(created)?)
        }
        Command::Update { resource, id, body } => {
            let updated = collection(settings, resource)?
                .update(&id, &parse_body(&body)?)
                .await?;
            print_json(&serde_json::to_value(updated)?)
        }
        Command::Delete { resource, id } => {
            collection(settings, resource)?.delete(&id).await?;
            info!(%resource, %id, "record deleted");
            Ok(())
        }
        Command::Act {
            resource,
            id,
            action,
        } => {
            let (segments, params) = split_action(&action)?;
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            let response = collection(settings, resource)?
                .act(&id, &segments, &params)
                .await?;
            info!(%resource, %id, action = %segments.join("/"), "record action applied");
            print_json(&response.data.unwrap_or(Value::Null))
        }
        Command::Suggest {
            resource,
            field,
            text,
        } => {
            let mut autocomplete = Autocomplete::new(collection(settings, resource)?, &field, settings);
            let mut updates = autocomplete.subscribe();
            autocomplete.input(&text);
            if text.chars().count() >= settings.autocomplete_min_chars {
                updates
                    .changed()
                    .await
                    .context("suggestion lookup stopped unexpectedly")?;
            }
            for entity in autocomplete.suggestions() {
                println!(
                    "{}\t{}",
                    entity.id,
                    entity.display_field(&field).unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Watch {
            resource,
            terms,
            interval_secs,
            rounds,
        } => {
            let terms = parse_terms(resource, &terms)?;
            watch(collection(settings, resource)?, terms, interval_secs, rounds).await
        }
        Command::Dashboard => {
            let http = HttpCollection::new(settings, Resource::Bus)?;
            let summary = load_dashboard(&http).await?;
            print_json(&serde_json::to_value(summary)?)
        }
    }
}

fn collection(settings: &Settings, resource: Resource) -> Result<Arc<HttpCollection>> {
    Ok(Arc::new(HttpCollection::new(settings, resource)?))
}

/// `field=value` arguments, with enum-valued fields checked and spelled
/// the way the backend expects.
fn parse_terms(resource: Resource, raw: &[String]) -> Result<SearchTerms> {
    let terms = SearchTerms::parse_pairs(raw)?;
    Ok(resource.normalize_terms(&terms)?)
}

/// Path segments up to the first `field=value` argument, parameters after.
fn split_action(raw: &[String]) -> Result<(Vec<String>, SearchTerms)> {
    let split = raw
        .iter()
        .position(|arg| arg.contains('='))
        .unwrap_or(raw.len());
    let (segments, params) = raw.split_at(split);
    if segments.is_empty() {
        bail!("an action needs at least one path segment before its parameters");
    }
    Ok((segments.to_vec(), SearchTerms::parse_pairs(params)?))
}

fn parse_body(raw: &str) -> Result<Value> {
    let body: Value = serde_json::from_str(raw).context("record body must be JSON")?;
    if !body.is_object() {
        bail!("record body must be a JSON object");
    }
    Ok(body)
}

async fn watch(
    collection: Arc<HttpCollection>,
    terms: SearchTerms,
    interval_secs: u64,
    rounds: u32,
) -> Result<()> {
    let view_model = CollectionViewModel::new(collection);
    let mut updates = view_model.updates();
    let printer = tokio::spawn(async move {
        while let Some(state) = updates.next().await {
            println!("{}", state_line(&state));
        }
    });

    view_model.search(terms).await;
    for _ in 1..rounds.max(1) {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        view_model.refetch().await;
    }

    drop(view_model);
    printer.await.context("state printer panicked")?;
    Ok(())
}

fn state_line(state: &CollectionState) -> Value {
    json!({
        "loading": state.loading,
        "count": state.data.len(),
        "error": state.error,
        "terms": state.search_terms,
    })
}

fn print_data(state: &CollectionState) -> Result<()> {
    if let Some(error) = &state.error {
        return Err(anyhow!(error.clone()));
    }
    print_json(&serde_json::to_value(&state.data)?)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
