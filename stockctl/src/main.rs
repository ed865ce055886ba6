use std::env;
use std::sync::Arc;

use clap::Parser;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use stockroom::authz::resolver::PermissionResolver;
use stockroom::conf::ResolutionSettings;
use stockroom::crud::{run_migrations, PgDb};
use stockroom::error::Result;
use stockroom::model::permission::PermissionCatalogue;

use process::{count_overrides, explain_matrix, process_configs, summarize_catalogue, ApplyContext};

mod process;

#[derive(Parser)]
struct CliArgs {
    /// Permission catalogue to validate and use, the bundled one when omitted.
    #[clap(short='c', long, default_value = None)]
    catalogue: Option<std::path::PathBuf>,
    #[clap(short='g', long, default_value = None)]
    group_configs: Option<std::path::PathBuf>,
    #[clap(short='u', long, default_value = None)]
    user_configs: Option<std::path::PathBuf>,
    #[clap(short='s', long, default_value = None)]
    structure_configs: Option<std::path::PathBuf>,
    /// Prints the effective permission matrix of the named user.
    #[clap(short='x', long, default_value = None)]
    explain_user: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();

    let catalogue = match &args.catalogue {
        Some(path) => {
            let catalogue = PermissionCatalogue::from_file(path)?;
            println!(
                "{} is a valid catalogue with {} permission sets:",
                path.to_string_lossy(),
                catalogue.len()
            );
            for line in summarize_catalogue(&catalogue) {
                println!("  {line}");
            }
            catalogue
        }
        None => PermissionCatalogue::bundled()?,
    };

    let needs_db = args.group_configs.is_some()
        || args.user_configs.is_some()
        || args.structure_configs.is_some()
        || args.explain_user.is_some();
    if !needs_db {
        return Ok(());
    }

    let ResolutionSettings {
        default_allow,
        tree_max_depth: max_depth,
    } = ResolutionSettings::from_env()?;
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    run_migrations(&db_url);

    let config = AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(db_url);
    let pool = Pool::builder()
        .build(config)
        .await
        .expect("pool failed to start");

    let mut db = PgDb::try_from_pool(&pool).await?;
    let ctx = ApplyContext {
        catalogue: &catalogue,
        max_depth,
    };

    if let Some(p) = args.group_configs {
        process_configs(&mut db, p, &ctx).await?;
    }

    if let Some(p) = args.user_configs {
        process_configs(&mut db, p, &ctx).await?;
    }

    if let Some(p) = args.structure_configs {
        process_configs(&mut db, p, &ctx).await?;
    }

    if let Some(name) = args.explain_user {
        let actor = db.load_actor(&name, max_depth).await?;
        println!(
            "User {} ({} own overrides, groups: [{}])",
            actor.user.name,
            count_overrides(&actor.user.permissions),
            actor
                .groups
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        let resolver = PermissionResolver::new(Arc::new(catalogue.clone()), default_allow);
        for line in explain_matrix(&resolver, &actor) {
            println!("  {line}");
        }
    }

    Ok(())
}
