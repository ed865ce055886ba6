use actix_web::{post, put, web, HttpRequest, HttpResponse, Responder};
use stockroom::authz::voter::VoterRegistry;
use stockroom::crud::PgDb;
use stockroom::model::permission::PermissionData;
use stockroom::model::structural::{EntityClass, NewStructuralEntity};
use stockroom::tree::cache::{CacheKeyProvider, TreeCacheInvalidator};
use stockroom::tree::generator::TreeViewGenerator;
use tracing::{info, warn};

use crate::error::Result;
use crate::utils::{actor_from_req, require, structural_class, UserHeader};
use crate::DbPool;

/// Creates a node in a structural hierarchy and evicts the cached trees of its class.
#[post("/structural/{class}")]
async fn create_structural(
    pool: web::Data<DbPool>,
    registry: web::Data<VoterRegistry>,
    generator: web::Data<TreeViewGenerator>,
    invalidator: web::Data<TreeCacheInvalidator>,
    user_header: web::Data<UserHeader>,
    class: web::Path<String>,
    new_entity: web::Json<NewStructuralEntity>,
    req: HttpRequest,
) -> Result<impl Responder> {
    let class = structural_class(&class)?;
    let mut db = PgDb::try_from_pool(&pool).await?;
    let actor = actor_from_req(&mut db, &req, &user_header, generator.max_depth()).await?;
    require(&registry, actor.as_ref(), &class, "create")?;

    let entity = db.create_structural_entity(class, &new_entity).await?;
    info!("Created {class} '{}' ({})", entity.name, entity.id);

    if let Err(e) = invalidator.entity_changed(class).await {
        warn!("Unable to invalidate cached {class} trees: {e}");
    }
    Ok(HttpResponse::Created().json(entity))
}

/// Replaces the explicit permissions of a user. The user's permission version
/// is bumped, so its previous cache key is retired.
#[put("/users/{name}/permissions")]
async fn set_user_permissions(
    pool: web::Data<DbPool>,
    registry: web::Data<VoterRegistry>,
    generator: web::Data<TreeViewGenerator>,
    invalidator: web::Data<TreeCacheInvalidator>,
    keys: web::Data<dyn CacheKeyProvider>,
    user_header: web::Data<UserHeader>,
    name: web::Path<String>,
    permissions: web::Json<PermissionData>,
    req: HttpRequest,
) -> Result<impl Responder> {
    let mut db = PgDb::try_from_pool(&pool).await?;
    let actor = actor_from_req(&mut db, &req, &user_header, generator.max_depth()).await?;
    require(&registry, actor.as_ref(), &EntityClass::User, "edit_permissions")?;

    let permissions = permissions.into_inner();
    registry
        .resolver()
        .catalogue()
        .validate_permission_data(&permissions)?;

    let target = db.load_actor(&name, generator.max_depth()).await?;
    let old_key = keys.cache_key(Some(&target));
    let user = db
        .set_user_permissions(&target.user.id, &permissions)
        .await?;
    info!(
        "Updated permissions of user {}, now at version {}",
        user.name, user.permissions_version
    );

    if let Err(e) = invalidator.cache_key_rotated(&old_key).await {
        warn!("Unable to evict cached trees of {old_key}: {e}");
    }
    if let Err(e) = invalidator.groups_changed().await {
        warn!("Unable to evict group derived cached trees: {e}");
    }
    Ok(HttpResponse::Ok().json(user))
}
