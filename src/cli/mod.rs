pub mod client;
pub mod form;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{encode_with_secret, generate_jwt, Claims, MAX_TOKEN_HOURS};
use crate::entities::EntityKind;
use client::ApiClient;
use form::EntityForm;

#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(about = "fleetctl - command-line client for the Fleet Admin API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "FLEET_API_URL", default_value = "http://localhost:3000", help = "API base URL")]
    pub url: String,

    #[arg(long, global = true, env = "FLEET_API_TOKEN", hide_env_values = true, help = "Bearer token")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a signed token for local development")]
    Token {
        #[arg(long, help = "User id placed in the `sub` claim")]
        user: String,
        #[arg(long, help = "Tenant id")]
        tenant: String,
        #[arg(long, value_delimiter = ',', default_value = "owner", help = "Comma-separated roles")]
        roles: Vec<String>,
        #[arg(
            long,
            value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_HOURS),
            help = "Lifetime in hours (defaults to the configured expiry)"
        )]
        hours: Option<i64>,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true, help = "Signing secret")]
        secret: Option<String>,
    },

    #[command(about = "Fetch one record")]
    Get {
        #[arg(value_parser = parse_entity, help = "Entity (e.g. vehicles, usage)")]
        entity: EntityKind,
        #[arg(help = "Record id")]
        id: String,
        #[arg(long, help = "Comma-separated relations to include")]
        include: Option<String>,
    },

    #[command(about = "List records in your tenant")]
    List {
        #[arg(value_parser = parse_entity, help = "Entity (e.g. vehicles, usage)")]
        entity: EntityKind,
        #[arg(long = "where", help = "JSON filter object")]
        where_clause: Option<String>,
        #[arg(long, help = "Order, e.g. \"created_at desc\"")]
        order: Option<String>,
        #[arg(long, help = "Maximum number of records")]
        limit: Option<i64>,
        #[arg(long, help = "Records to skip")]
        offset: Option<i64>,
        #[arg(long, help = "Comma-separated relations to include")]
        include: Option<String>,
    },

    #[command(about = "Delete one record")]
    Delete {
        #[arg(value_parser = parse_entity, help = "Entity (e.g. vehicles, usage)")]
        entity: EntityKind,
        #[arg(help = "Record id")]
        id: String,
    },

    #[command(about = "Edit a record (or create one when no id is given)")]
    Edit {
        #[arg(value_parser = parse_entity, help = "Entity (e.g. vehicles, usage)")]
        entity: EntityKind,
        #[arg(help = "Record id; omit to create")]
        id: Option<String>,
        #[arg(long = "set", value_name = "FIELD=VALUE", help = "Field override; repeatable")]
        set: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Accepts the route name (`performance-assessments`) or the entity name (`performance_assessment`)
pub fn parse_entity(s: &str) -> Result<EntityKind, String> {
    EntityKind::from_route(s)
        .or_else(|| EntityKind::from_name(s))
        .ok_or_else(|| {
            let known: Vec<&str> = EntityKind::ALL.iter().map(|k| k.route()).collect();
            format!("unknown entity '{}' (expected one of: {})", s, known.join(", "))
        })
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token { user, tenant, roles, hours, secret } => {
            let claims = token_claims(user, tenant, roles, hours);
            let token = match secret {
                Some(secret) => encode_with_secret(&claims, &secret),
                None => generate_jwt(&claims),
            }
            .context("failed to sign token")?;
            match output_format {
                OutputFormat::Json => utils::output_json(&json!({ "token": token, "expires_at": claims.exp })),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
        Commands::Get { entity, id, include } => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            let mut params = Vec::new();
            if let Some(include) = include {
                params.push(("include".to_string(), include));
            }
            let record = client.get(entity, &id, &params).await?;
            utils::output_record(output_format, &record)
        }
        Commands::List { entity, where_clause, order, limit, offset, include } => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            let mut params = Vec::new();
            if let Some(w) = where_clause {
                params.push(("where".to_string(), w));
            }
            if let Some(o) = order {
                params.push(("order".to_string(), o));
            }
            if let Some(l) = limit {
                params.push(("limit".to_string(), l.to_string()));
            }
            if let Some(o) = offset {
                params.push(("offset".to_string(), o.to_string()));
            }
            if let Some(i) = include {
                params.push(("include".to_string(), i));
            }
            let records = client.list(entity, &params).await?;
            utils::output_records(output_format, &records)
        }
        Commands::Delete { entity, id } => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            let record = client.delete(entity, &id).await?;
            utils::output_record(output_format, &record)
        }
        Commands::Edit { entity, id, set } => {
            let client = ApiClient::new(&cli.url, cli.token)?;
            let overrides = form::parse_overrides(&set)?;
            let outcome = EntityForm::open(&client, entity, id.as_deref()).await?.submit(&client, &overrides).await?;
            utils::output_form_outcome(output_format, &outcome)
        }
    }
}

/// `hours` is bounded by the argument parser; without it the configured expiry applies
fn token_claims(user: String, tenant: String, roles: Vec<String>, hours: Option<i64>) -> Claims {
    match hours {
        Some(hours) => Claims::with_expiry(user, tenant, roles, chrono::Duration::hours(hours)),
        None => Claims::new(user, tenant, roles),
    }
}
