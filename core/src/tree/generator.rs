use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, StockroomError};
use crate::model::structural::EntityClass;
use crate::model::user::Actor;
use crate::tree::cache::{tree_cache_key, tree_cache_tags, CacheKeyProvider, CachedForest, TreeCache};
use crate::tree::node::TreeNode;
use crate::tree::repository::AdjacencyRepository;

/// Which page a decorated node links to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    ListParts,
    Edit,
    Info,
}

impl FromStr for LinkKind {
    type Err = StockroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list_parts" => Ok(LinkKind::ListParts),
            "edit" => Ok(LinkKind::Edit),
            "info" => Ok(LinkKind::Info),
            _ => Err(StockroomError::InvalidRequest(format!("unknown link kind '{s}'"))),
        }
    }
}

/// Resolves the navigation target of a node during decoration.
pub trait UrlResolver: Send + Sync {
    fn resolve_href(&self, class: EntityClass, id: Uuid, link: LinkKind) -> Result<String>;
}

/// Builds hrefs below a public base URL: `<base>/<class>/<id>[/parts|/edit]`.
#[derive(Debug, Clone)]
pub struct RouteUrlResolver {
    base: Url,
}

impl RouteUrlResolver {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }
}

impl UrlResolver for RouteUrlResolver {
    fn resolve_href(&self, class: EntityClass, id: Uuid, link: LinkKind) -> Result<String> {
        let path = match link {
            LinkKind::ListParts => format!("{}/{}/parts", class.name(), id),
            LinkKind::Edit => format!("{}/{}/edit", class.name(), id),
            LinkKind::Info => format!("{}/{}", class.name(), id),
        };
        Ok(self.base.join(&path)?.to_string())
    }
}

/// A tree view query. `parent == None` asks for the whole class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TreeRequest {
    pub class: EntityClass,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub link: Option<LinkKind>,
    #[serde(default)]
    pub selected: Option<Uuid>,
}

impl TreeRequest {
    pub fn new(class: EntityClass) -> Self {
        Self {
            class,
            parent: None,
            link: None,
            selected: None,
        }
    }

    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_link(mut self, link: LinkKind) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_selected(mut self, selected: Uuid) -> Self {
        self.selected = Some(selected);
        self
    }
}

/// Builds, caches and decorates tree views of structural entity classes.
///
/// Whole-class forests are cached undecorated under a key derived from the
/// class and the caller's cache identity. Subtree queries always go to the
/// repository. Decoration (selection, child count tags, hrefs) is applied to a
/// per-request copy after retrieval, so cached forests are never mutated.
pub struct TreeViewGenerator {
    cache: Arc<dyn TreeCache>,
    keys: Arc<dyn CacheKeyProvider>,
    urls: Arc<dyn UrlResolver>,
    max_depth: usize,
}

impl TreeViewGenerator {
    pub fn new(
        cache: Arc<dyn TreeCache>,
        keys: Arc<dyn CacheKeyProvider>,
        urls: Arc<dyn UrlResolver>,
        max_depth: usize,
    ) -> Self {
        Self {
            cache,
            keys,
            urls,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The tree query surface: fetches the generic tree and decorates a copy.
    pub async fn get_tree_view(
        &self,
        repo: &mut dyn AdjacencyRepository,
        actor: Option<&Actor>,
        request: &TreeRequest,
    ) -> Result<Vec<TreeNode>> {
        let generic = self
            .get_generic_tree(repo, actor, request.class, request.parent)
            .await?;
        let mut forest = generic.as_ref().clone();
        self.decorate(&mut forest, request.class, request.link, request.selected)?;
        Ok(forest)
    }

    /// The undecorated forest of `class`, below `parent` if given. Only
    /// parent-less queries are served from and stored into the cache.
    pub async fn get_generic_tree(
        &self,
        repo: &mut dyn AdjacencyRepository,
        actor: Option<&Actor>,
        class: EntityClass,
        parent: Option<Uuid>,
    ) -> Result<CachedForest> {
        if !class.is_structural() {
            return Err(StockroomError::Configuration(format!(
                "entity class '{class}' does not support a tree hierarchy"
            )));
        }

        if let Some(parent) = parent {
            debug!("Building uncached {class} subtree below {parent}");
            return Ok(Arc::new(repo.subtree(class, parent, self.max_depth).await?));
        }

        let identity = self.keys.cache_key(actor);
        let key = tree_cache_key(class, &identity);
        match self.cache.get(&key).await {
            Ok(Some(forest)) => {
                debug!("Tree cache hit for {class} as {identity}");
                return Ok(forest);
            }
            Ok(None) => debug!("Tree cache miss for {class} as {identity}"),
            Err(e) => warn!("Tree cache read failed, rebuilding {class} tree: {e}"),
        }

        let forest = Arc::new(repo.root_nodes(class, self.max_depth).await?);
        if let Err(e) = self
            .cache
            .put(&key, forest.clone(), &tree_cache_tags(class, &identity))
            .await
        {
            warn!("Tree cache write failed for {class} tree: {e}");
        }
        Ok(forest)
    }

    /// Decorates `forest` in place, depth-first pre-order.
    pub fn decorate(
        &self,
        forest: &mut [TreeNode],
        class: EntityClass,
        link: Option<LinkKind>,
        selected: Option<Uuid>,
    ) -> Result<()> {
        for node in forest.iter_mut() {
            self.decorate_node(node, class, link, selected)?;
        }
        Ok(())
    }

    fn decorate_node(
        &self,
        node: &mut TreeNode,
        class: EntityClass,
        link: Option<LinkKind>,
        selected: Option<Uuid>,
    ) -> Result<()> {
        if selected == Some(node.id) {
            node.selected = true;
        }
        if !node.children.is_empty() {
            node.tags.push(node.children.len().to_string());
        }
        if let Some(link) = link {
            node.href = Some(self.urls.resolve_href(class, node.id, link)?);
        }
        for child in node.children.iter_mut() {
            self.decorate_node(child, class, link, selected)?;
        }
        Ok(())
    }
}
