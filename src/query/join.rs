//! Join clause manager.
//!
//! Joins are keyed by path identity: the alias of the parent node plus the
//! association name. Explicit joins are added by the caller while the builder is
//! open; implicit joins are synthesized once, when the builder is finalized, for
//! every association that an expression dereferences (`c.owner.address.city`
//! needs `c.owner` and `owner_1.address` joined). After that the manager only
//! answers lookups through [`PathResolver`].

use crate::error::CriteriaError;
use crate::expression::{Expression, PathResolver};
use crate::metamodel::{AssociationKind, EntityType, Metamodel};
use crate::predicate::render::render_predicate;
use crate::predicate::Predicate;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Join flavour of an explicit or implicit join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

/// One node of the join graph
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub parent_alias: String,
    pub association: String,
    pub alias: String,
    pub join_type: JoinType,
    pub fetch: bool,
    pub implicit: bool,
    pub kind: AssociationKind,
    pub on: Option<Predicate>,
    /// Target entity, `None` for element collections
    pub entity: Option<Arc<EntityType>>,
    /// The alias is used by a restricting clause, so the node is rendered in
    /// count and id queries even when it is a fetch join
    referenced: bool,
}

impl JoinNode {
    fn path(&self) -> String {
        format!("{}.{}", self.parent_alias, self.association)
    }

    fn render(&self, fetch: bool, resolver: &dyn PathResolver) -> Result<String, CriteriaError> {
        let mut sb = String::from(self.join_type.to_sql());
        if fetch {
            sb.push_str(" FETCH");
        }
        sb.push(' ');
        sb.push_str(&self.path());
        sb.push(' ');
        sb.push_str(&self.alias);
        if let Some(on) = &self.on {
            sb.push_str(" ON ");
            sb.push_str(&render_predicate(on, resolver)?);
        }
        Ok(sb)
    }
}

/// Owns the root alias and every join of one query scope
#[derive(Debug, Clone)]
pub struct JoinManager {
    metamodel: Arc<Metamodel>,
    root_entity: Arc<EntityType>,
    root_alias: String,
    nodes: Vec<JoinNode>,
    alias_counter: usize,
    /// Aliases owned by attached subqueries; never generated or reused here
    reserved: BTreeSet<String>,
}

impl JoinManager {
    pub fn new(metamodel: Arc<Metamodel>, root_entity: Arc<EntityType>, root_alias: impl Into<String>) -> Self {
        Self {
            metamodel,
            root_entity,
            root_alias: root_alias.into(),
            nodes: Vec::new(),
            alias_counter: 0,
            reserved: BTreeSet::new(),
        }
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub fn root_entity(&self) -> &Arc<EntityType> {
        &self.root_entity
    }

    pub fn nodes(&self) -> &[JoinNode] {
        &self.nodes
    }

    /// Root alias followed by every join alias
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root_alias.as_str()).chain(self.nodes.iter().map(|n| n.alias.as_str()))
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases().any(|a| a == alias)
    }

    /// Keep `alias` out of this scope (used by a nested subquery)
    pub fn reserve_alias(&mut self, alias: &str) {
        self.reserved.insert(alias.to_string());
    }

    fn is_taken(&self, alias: &str) -> bool {
        self.has_alias(alias) || self.reserved.contains(alias)
    }

    fn node_by_alias(&self, alias: &str) -> Option<&JoinNode> {
        self.nodes.iter().find(|n| n.alias == alias)
    }

    /// Entity type bound to `alias`; `Some(None)` for element collection aliases
    fn entity_for_alias(&self, alias: &str) -> Option<Option<Arc<EntityType>>> {
        if alias == self.root_alias {
            return Some(Some(self.root_entity.clone()));
        }
        self.node_by_alias(alias).map(|n| n.entity.clone())
    }

    /// Whether any rendered join can multiply root rows
    pub fn has_collection_joins(&self) -> bool {
        self.nodes.iter().any(|n| n.kind.is_collection() && (!n.fetch || n.referenced))
    }

    /// Aliases of plain collection joins and of every join nested under one
    ///
    /// Rows of these aliases multiply root rows in the data query. Fetch joins
    /// are left out since their rows are merged into the fetched collection.
    pub fn multiplying_aliases(&self) -> BTreeSet<&str> {
        let mut aliases = BTreeSet::new();
        // Parents are always added before their children
        for node in &self.nodes {
            if (node.kind.is_collection() && !node.fetch) || aliases.contains(node.parent_alias.as_str()) {
                aliases.insert(node.alias.as_str());
            }
        }
        aliases
    }

    /// Add an explicit join on `path` (`alias.association`, possibly longer)
    ///
    /// Intermediate associations of a longer path are joined implicitly.
    ///
    /// # Errors
    ///
    /// - `UnknownAlias` when the path does not start with an alias in scope
    /// - `UnknownAttribute` when a segment is not an association
    /// - `DuplicateAlias` when `alias` is already used in this scope
    pub fn join(
        &mut self,
        path: &str,
        alias: &str,
        join_type: JoinType,
        fetch: bool,
        on: Option<Predicate>,
    ) -> Result<(), CriteriaError> {
        if self.is_taken(alias) {
            return Err(CriteriaError::DuplicateAlias(alias.to_string()));
        }
        let (parent_path, association) = path
            .rsplit_once('.')
            .ok_or_else(|| CriteriaError::UnknownAlias(path.to_string()))?;
        let parent_alias = if parent_path.contains('.') {
            self.join_path(parent_path)?
        } else if self.has_alias(parent_path) {
            parent_path.to_string()
        } else {
            return Err(CriteriaError::UnknownAlias(parent_path.to_string()));
        };

        let (kind, entity) = self.association_of(&parent_alias, association)?;
        log::trace!("Explicit join {}.{} as {}", parent_alias, association, alias);
        self.nodes.push(JoinNode {
            parent_alias,
            association: association.to_string(),
            alias: alias.to_string(),
            join_type,
            fetch,
            implicit: false,
            kind,
            on,
            entity,
            referenced: false,
        });
        Ok(())
    }

    fn association_of(
        &self,
        parent_alias: &str,
        association: &str,
    ) -> Result<(AssociationKind, Option<Arc<EntityType>>), CriteriaError> {
        let owner = self
            .entity_for_alias(parent_alias)
            .ok_or_else(|| CriteriaError::UnknownAlias(parent_alias.to_string()))?
            .ok_or_else(|| CriteriaError::UnknownAttribute(format!("{parent_alias}.{association}")))?;
        let assoc = owner
            .association(association)
            .ok_or_else(|| CriteriaError::UnknownAttribute(format!("{}.{}", owner.name(), association)))?;
        Ok((assoc.kind, self.metamodel.association_target(&owner, association)))
    }

    /// Join every segment of `path` (all of them, including the last) and
    /// return the alias of the last join
    fn join_path(&mut self, path: &str) -> Result<String, CriteriaError> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        if !self.has_alias(first) {
            return Err(CriteriaError::UnknownAlias(first.to_string()));
        }
        let mut current = first.to_string();
        for segment in segments {
            current = self.implicit_join(&current, segment)?;
        }
        Ok(current)
    }

    /// Find the non-fetch join for `(parent_alias, association)` or synthesize one
    fn implicit_join(&mut self, parent_alias: &str, association: &str) -> Result<String, CriteriaError> {
        if let Some(node) = self.find_joinable(parent_alias, association) {
            return Ok(node.alias.clone());
        }
        let (kind, entity) = self.association_of(parent_alias, association)?;
        let alias = self.next_alias(association);
        log::trace!("Implicit join {}.{} as {}", parent_alias, association, alias);
        self.nodes.push(JoinNode {
            parent_alias: parent_alias.to_string(),
            association: association.to_string(),
            alias: alias.clone(),
            join_type: JoinType::Inner,
            fetch: false,
            implicit: true,
            kind,
            on: None,
            entity,
            referenced: false,
        });
        Ok(alias)
    }

    fn find_joinable(&self, parent_alias: &str, association: &str) -> Option<&JoinNode> {
        self.nodes
            .iter()
            .find(|n| !n.fetch && n.on.is_none() && n.parent_alias == parent_alias && n.association == association)
    }

    fn next_alias(&mut self, association: &str) -> String {
        loop {
            self.alias_counter += 1;
            let candidate = format!("{}_{}", association, self.alias_counter);
            if !self.is_taken(&candidate) {
                return candidate;
            }
        }
    }

    /// Synthesize the joins required by every path in `expressions`
    ///
    /// Paths that do not start with an alias of this scope (correlated outer
    /// aliases, select aliases) are left alone. The last segment of a path is
    /// never joined.
    pub fn apply_implicit_joins(&mut self, expressions: &[Expression]) -> Result<(), CriteriaError> {
        for expression in expressions {
            let paths: Vec<String> = expression.paths().map(str::to_string).collect();
            for path in paths {
                self.apply_path(&path)?;
            }
        }
        Ok(())
    }

    fn apply_path(&mut self, path: &str) -> Result<(), CriteriaError> {
        let segments: Vec<&str> = path.split('.').collect();
        if !self.has_alias(segments[0]) {
            return Ok(());
        }
        let mut current = segments[0].to_string();
        for segment in &segments[1..segments.len() - 1] {
            let owner = match self.entity_for_alias(&current) {
                Some(Some(entity)) => entity,
                _ => return Ok(()),
            };
            if owner.association(segment).is_none() {
                // Basic or embedded attribute; nothing further to join
                return Ok(());
            }
            current = self.implicit_join(&current, segment)?;
        }
        Ok(())
    }

    /// Flag fetch joins whose alias is used by a restricting clause so that the
    /// count and id queries still render them
    pub fn mark_referenced(&mut self, expressions: &[Expression]) {
        let used: BTreeSet<String> = expressions
            .iter()
            .flat_map(|e| e.paths().filter_map(|p| p.split('.').next()).map(str::to_string).collect::<Vec<_>>())
            .collect();
        for node in &mut self.nodes {
            if used.contains(&node.alias) {
                node.referenced = true;
            }
        }
        // A referenced node needs its parents as well
        loop {
            let parents: Vec<String> = self
                .nodes
                .iter()
                .filter(|n| n.referenced)
                .map(|n| n.parent_alias.clone())
                .collect();
            let mut changed = false;
            for node in &mut self.nodes {
                if !node.referenced && parents.contains(&node.alias) {
                    node.referenced = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Render the join clause
    ///
    /// With `include_fetches == false` (count and id queries) fetch joins are
    /// omitted, unless a restricting clause uses their alias, in which case they
    /// are rendered as plain joins.
    pub fn build_joins(&self, include_fetches: bool) -> Result<String, CriteriaError> {
        let mut parts = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let fetch = match (node.fetch, include_fetches) {
                (false, _) => false,
                (true, true) => true,
                (true, false) if node.referenced => false,
                (true, false) => continue,
            };
            parts.push(node.render(fetch, self)?);
        }
        Ok(parts.join(" "))
    }

    /// Rewrite a path through the existing joins, `None` if nothing is joined
    fn resolve_path(&self, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('.').collect();
        if !self.has_alias(segments[0]) {
            return None;
        }
        let mut current = segments[0];
        let mut consumed = 0;
        for segment in &segments[1..segments.len() - 1] {
            match self.find_joinable(current, segment) {
                Some(node) => {
                    current = &node.alias;
                    consumed += 1;
                }
                None => break,
            }
        }
        if consumed == 0 {
            return None;
        }
        let rest = segments[consumed + 1..].join(".");
        Some(format!("{current}.{rest}"))
    }
}

impl PathResolver for JoinManager {
    fn resolve(&self, expression: &Expression) -> String {
        expression.rewrite_paths(|path| self.resolve_path(path))
    }
}
