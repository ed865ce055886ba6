use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use stockroom::authz::voter::VoterRegistry;
use stockroom::crud::PgDb;
use stockroom::model::structural::{EntityClass, SubjectRef};
use stockroom::tree::generator::TreeViewGenerator;
use uuid::Uuid;

use crate::error::Result;
use crate::utils::{actor_from_req, UserHeader};
use crate::DbPool;

#[derive(Serialize, Deserialize, Debug)]
struct AuthorizationResponse {
    allowed: bool,
}

#[derive(Deserialize, Debug)]
struct AuthorizationOptions {
    id: Option<Uuid>,
}

/// Answers whether the requesting user may perform `attribute` on `class`, or
/// on one entity of it when `id` is passed. Unknown attributes are denied.
#[get("/authz/{class}/{attribute}")]
async fn is_granted(
    pool: web::Data<DbPool>,
    registry: web::Data<VoterRegistry>,
    generator: web::Data<TreeViewGenerator>,
    user_header: web::Data<UserHeader>,
    path: web::Path<(String, String)>,
    options: web::Query<AuthorizationOptions>,
    req: HttpRequest,
) -> Result<impl Responder> {
    let (class, attribute) = path.into_inner();
    let class: EntityClass = class.parse()?;
    let mut db = PgDb::try_from_pool(&pool).await?;
    let actor = actor_from_req(&mut db, &req, &user_header, generator.max_depth()).await?;

    let allowed = match options.id {
        Some(id) => registry.is_allowed(actor.as_ref(), &SubjectRef { class, id }, &attribute),
        None => registry.is_allowed(actor.as_ref(), &class, &attribute),
    };
    Ok(HttpResponse::Ok().json(AuthorizationResponse { allowed }))
}
