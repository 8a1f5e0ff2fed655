use std::path::PathBuf;

use aclkit_db::secure::{AclFilter, AclSpecification, QueryTarget};
use aclkit_db::AclSettings;
use aclkit_security::{AclPrincipal, IdValue, permission};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use sea_orm::sea_query::{
    Alias, Asterisk, MysqlQueryBuilder, PostgresQueryBuilder, Query, QueryStatementWriter,
    SelectStatement, SqliteQueryBuilder,
};
use tracing_subscriber::EnvFilter;

/// Print the access-filtered SQL for one entity type, principal and permission.
#[derive(Parser, Debug)]
#[command(name = "aclkit-explain", version, about)]
struct Cli {
    /// Settings file with `acl` and `schema` sections (YAML).
    #[arg(short, long)]
    config: PathBuf,

    /// Entity type to query.
    #[arg(short, long)]
    entity: String,

    /// Requested permission, e.g. `read` or `task:update`.
    #[arg(short, long, default_value = permission::READ)]
    permission: String,

    /// Principal identifier. Omit to explain the anonymous case.
    #[arg(short, long)]
    user_id: Option<String>,

    /// Authority held by the principal (repeatable).
    #[arg(short, long = "authority")]
    authorities: Vec<String>,

    /// Alias for the root table.
    #[arg(long)]
    alias: Option<String>,

    /// SQL dialect to render.
    #[arg(short, long, value_enum, default_value_t = Backend::Postgres)]
    backend: Backend,

    /// Log every predicate decision.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Postgres,
    Mysql,
    Sqlite,
}

impl Backend {
    fn render(self, stmt: &SelectStatement) -> String {
        match self {
            Self::Postgres => stmt.to_string(PostgresQueryBuilder),
            Self::Mysql => stmt.to_string(MysqlQueryBuilder),
            Self::Sqlite => stmt.to_string(SqliteQueryBuilder),
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn principal(cli: &Cli) -> Option<AclPrincipal> {
    let raw = cli.user_id.as_deref()?;
    Some(
        AclPrincipal::builder(IdValue::parse(raw))
            .username(raw)
            .authorities(&cli.authorities)
            .build(),
    )
}

fn explain(cli: &Cli) -> Result<String> {
    permission::validate(&cli.permission)
        .with_context(|| format!("invalid permission '{}'", cli.permission))?;

    let settings = AclSettings::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let spec = AclSpecification::from_schema(&settings.schema, settings.acl)
        .context("invalid ACL schema")?;
    let table = spec
        .metadata()
        .entity(&cli.entity)
        .map(|meta| meta.table.clone())
        .ok_or_else(|| anyhow!("entity type '{}' is not declared", cli.entity))?;

    let mut stmt = Query::select();
    stmt.column(Asterisk);
    let mut target = QueryTarget::new(&cli.entity);
    match cli.alias.as_deref() {
        Some(alias) => {
            stmt.from_as(Alias::new(table), Alias::new(alias));
            target = target.aliased(alias);
        }
        None => {
            stmt.from(Alias::new(table));
        }
    }

    let principal = principal(cli);
    let filter = spec.to_predicate(&mut stmt, &target, principal.as_ref(), &cli.permission)?;
    let outcome = match &filter {
        AclFilter::Grant => "grant",
        AclFilter::Deny => "deny",
        AclFilter::Restrict(_) => "restrict",
    };
    tracing::info!(entity = %cli.entity, permission = %cli.permission, outcome, "compiled");

    if !filter.is_grant() {
        stmt.cond_where(filter.into_condition());
    }
    Ok(format!("-- {outcome}\n{}", cli.backend.render(&stmt)))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    println!("{}", explain(&cli)?);
    Ok(())
}
