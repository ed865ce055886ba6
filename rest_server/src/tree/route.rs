use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use stockroom::authz::voter::VoterRegistry;
use stockroom::crud::PgDb;
use stockroom::tree::generator::{LinkKind, TreeRequest, TreeViewGenerator};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::utils::{actor_from_req, require, structural_class, UserHeader};
use crate::DbPool;

#[derive(Deserialize, Debug)]
struct TreeOptions {
    parent: Option<Uuid>,
    link: Option<LinkKind>,
    selected: Option<Uuid>,
}

#[get("/tree/{class}")]
async fn get_tree(
    pool: web::Data<DbPool>,
    registry: web::Data<VoterRegistry>,
    generator: web::Data<TreeViewGenerator>,
    user_header: web::Data<UserHeader>,
    class: web::Path<String>,
    options: web::Query<TreeOptions>,
    req: HttpRequest,
) -> Result<impl Responder> {
    let class = structural_class(&class)?;
    let mut db = PgDb::try_from_pool(&pool).await?;
    let actor = actor_from_req(&mut db, &req, &user_header, generator.max_depth()).await?;
    require(&registry, actor.as_ref(), &class, "read")?;

    info!(
        "Got tree request for {class} from {}",
        actor.as_ref().map(|a| a.user.name.as_str()).unwrap_or("anonymous")
    );

    let options = options.into_inner();
    let request = TreeRequest {
        class,
        parent: options.parent,
        link: options.link,
        selected: options.selected,
    };
    let forest = generator
        .get_tree_view(&mut db, actor.as_ref(), &request)
        .await?;
    Ok(HttpResponse::Ok().json(forest))
}
