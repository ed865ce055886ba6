use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use stockroom::authz::resolver::PermissionResolver;
use stockroom::authz::voter::VoterRegistry;
use stockroom::conf::EnvConfigSettings;
use stockroom::crud::run_migrations;
use stockroom::tree::cache::{
    CacheKeyProvider, GroupCacheKeyProvider, InMemoryTreeCache, NullTreeCache, TreeCache,
    TreeCacheInvalidator,
};
use stockroom::tree::generator::{RouteUrlResolver, TreeViewGenerator};
use tracing::info;

use crate::utils::UserHeader;

mod admin;
mod authz;
mod error;
mod tree;
mod utils;

type DbPool = Pool<AsyncPgConnection>;

pub async fn run() -> std::io::Result<()> {
    let env_config = EnvConfigSettings::init();

    let catalogue = env_config
        .load_catalogue()
        .unwrap_or_else(|e| panic!("Unable to load permission catalogue with error {e}"));
    info!(
        "Loaded permission catalogue with {} permission sets, default permission is {}",
        catalogue.len(),
        if env_config.default_allow { "allow" } else { "deny" }
    );
    let resolver = Arc::new(PermissionResolver::new(
        Arc::new(catalogue),
        env_config.default_allow,
    ));
    let registry = web::Data::new(
        VoterRegistry::try_new(resolver).expect("Failed to register entity voters!"),
    );

    let cache: Arc<dyn TreeCache> = if env_config.tree_cache_enabled {
        Arc::new(InMemoryTreeCache::new())
    } else {
        info!("Tree caching is disabled");
        Arc::new(NullTreeCache)
    };
    let keys: Arc<dyn CacheKeyProvider> = Arc::new(GroupCacheKeyProvider);
    let urls = RouteUrlResolver::new(&env_config.public_base_url)
        .expect("Unable to parse PUBLIC_BASE_URL as a URL");
    let generator = web::Data::new(TreeViewGenerator::new(
        cache.clone(),
        keys.clone(),
        Arc::new(urls),
        env_config.tree_max_depth,
    ));
    let invalidator = web::Data::new(TreeCacheInvalidator::new(cache));
    let keys = web::Data::from(keys);
    let user_header = web::Data::new(UserHeader(env_config.user_header.clone()));

    let db_url = env_config.db_url.clone();
    web::block(move || run_migrations(&db_url))
        .await
        .expect("Migration task failed to complete");

    let diesel_config =
        AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(env_config.db_url);
    let pool = Pool::builder()
        .build(diesel_config)
        .await
        .expect("pool failed to start");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(registry.clone())
            .app_data(generator.clone())
            .app_data(invalidator.clone())
            .app_data(keys.clone())
            .app_data(user_header.clone())
            .service(tree::route::get_tree)
            .service(authz::route::is_granted)
            .service(admin::route::create_structural)
            .service(admin::route::set_user_permissions)
    })
    .bind((
        env_config.rest_url,
        env_config
            .rest_port
            .parse()
            .expect("Unable to parse REST_SERVICE_PORT as a port"),
    ))?
    .run()
    .await
}
