use actix_web::HttpRequest;

use stockroom::authz::voter::VoterRegistry;
use stockroom::crud::PgDb;
use stockroom::error::StockroomError;
use stockroom::model::structural::{AuthorizationSubject, EntityClass};
use stockroom::model::user::Actor;
use tracing::debug;

use crate::error::{ApiError, Result};

/// Name of the header the authenticating proxy uses to pass the user name.
#[derive(Debug, Clone)]
pub(crate) struct UserHeader(pub(crate) String);

/// Reads the requesting user's name from `user_header`, `None` when the
/// request is anonymous.
pub(crate) fn user_name_from_header<'r>(
    req: &'r HttpRequest,
    user_header: &UserHeader,
) -> Result<Option<&'r str>> {
    let Some(value) = req.headers().get(&user_header.0) else {
        return Ok(None);
    };
    let name = value.to_str().map_err(|_e| {
        ApiError::unauthorized("Invalid user header value. Unable to identify client.")
    })?;
    if name.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(name))
}

/// Loads the [Actor] named by the user header together with its group chain.
pub(crate) async fn actor_from_req(
    db: &mut PgDb<'_>,
    req: &HttpRequest,
    user_header: &UserHeader,
    max_depth: usize,
) -> Result<Option<Actor>> {
    let Some(name) = user_name_from_header(req, user_header)? else {
        return Ok(None);
    };
    match db.load_actor(name, max_depth).await {
        Ok(actor) => Ok(Some(actor)),
        Err(StockroomError::NotFound(_)) => Err(ApiError::unauthorized(&format!(
            "Unknown user '{name}'. Unable to identify client."
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Parses a class named in the request path, rejecting classes without a
/// hierarchy as a bad request.
pub(crate) fn structural_class(raw: &str) -> Result<EntityClass> {
    let class: EntityClass = raw.parse()?;
    if !class.is_structural() {
        return Err(StockroomError::InvalidRequest(format!(
            "entity class '{class}' has no tree hierarchy"
        ))
        .into());
    }
    Ok(class)
}

/// Fails with 403 unless `actor` is granted `attribute` on `subject`.
pub(crate) fn require(
    registry: &VoterRegistry,
    actor: Option<&Actor>,
    subject: &dyn AuthorizationSubject,
    attribute: &str,
) -> Result<()> {
    if registry.is_allowed(actor, subject, attribute) {
        return Ok(());
    }
    let who = actor.map(|a| a.user.name.as_str()).unwrap_or("anonymous");
    debug!(
        "Denied {attribute} on {} for {who}",
        subject.entity_class()
    );
    Err(ApiError::forbidden(&format!(
        "{who} may not {attribute} {}",
        subject.entity_class()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;
    use actix_web::ResponseError;

    #[test]
    fn reads_user_from_header() -> Result<()> {
        let header = UserHeader("X-Stockroom-User".into());
        let req = TestRequest::default()
            .insert_header(("X-Stockroom-User", "alice"))
            .to_http_request();
        assert_eq!(user_name_from_header(&req, &header)?, Some("alice"));

        let req = TestRequest::default().to_http_request();
        assert_eq!(user_name_from_header(&req, &header)?, None);

        let req = TestRequest::default()
            .insert_header(("X-Stockroom-User", " "))
            .to_http_request();
        assert_eq!(user_name_from_header(&req, &header)?, None);
        Ok(())
    }

    #[test]
    fn only_structural_classes_have_trees() {
        assert!(matches!(structural_class("category"), Ok(EntityClass::Category)));
        let err = structural_class("part").expect_err("parts are flat");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = structural_class("widget").expect_err("unknown class");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
