use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{category, product},
    errors::ServiceError,
    services::audit::{AuditAction, AuditEntry, AuditService},
    services::category_tree::{CategoryNode, CategoryTree},
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Position must be at least 1"))]
    #[serde(default)]
    pub position: Option<i32>,
}

/// Partial update. `parentId: null` moves the category to the root level, an absent
/// `parentId` keeps the current parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub parent_id: Option<Option<Uuid>>,
    #[validate(range(min = 1, message = "Position must be at least 1"))]
    #[serde(default)]
    pub position: Option<i32>,
}

fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCategoriesRequest {
    #[validate(length(min = 1, message = "categoryIds must not be empty"))]
    pub category_ids: Vec<Uuid>,
}

fn siblings_of(parent_id: Option<Uuid>) -> Condition {
    match parent_id {
        Some(parent) => Condition::all().add(category::Column::ParentId.eq(parent)),
        None => Condition::all().add(category::Column::ParentId.is_null()),
    }
}

async fn next_position<C: ConnectionTrait>(
    conn: &C,
    parent_id: Option<Uuid>,
    exclude: Option<Uuid>,
) -> Result<i32, ServiceError> {
    let mut query = category::Entity::find()
        .select_only()
        .column_as(Expr::col(category::Column::Position).max(), "max_position")
        .filter(siblings_of(parent_id));
    if let Some(id) = exclude {
        query = query.filter(category::Column::Id.ne(id));
    }
    let max: Option<Option<i32>> = query.into_tuple().one(conn).await?;
    Ok(max.flatten().unwrap_or(0) + 1)
}

/// Makes room for `position` among the siblings by moving the occupant and every later
/// sibling up by one. Nothing moves when the slot is free.
async fn open_slot<C: ConnectionTrait>(
    conn: &C,
    parent_id: Option<Uuid>,
    position: i32,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut occupied = category::Entity::find()
        .filter(siblings_of(parent_id))
        .filter(category::Column::Position.eq(position));
    if let Some(id) = exclude {
        occupied = occupied.filter(category::Column::Id.ne(id));
    }
    if occupied.count(conn).await? == 0 {
        return Ok(());
    }

    let mut shift = category::Entity::update_many()
        .col_expr(
            category::Column::Position,
            Expr::col(category::Column::Position).add(1),
        )
        .filter(siblings_of(parent_id))
        .filter(category::Column::Position.gte(position));
    if let Some(id) = exclude {
        shift = shift.filter(category::Column::Id.ne(id));
    }
    shift.exec(conn).await?;
    Ok(())
}

async fn load_tree<C: ConnectionTrait>(conn: &C) -> Result<CategoryTree, ServiceError> {
    Ok(CategoryTree::build(category::Entity::find().all(conn).await?))
}

#[derive(Debug, Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    audit: Arc<AuditService>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<category::Model>, u64), ServiceError> {
        let paginator = category::Entity::find()
            .order_by_asc(category::Column::Position)
            .order_by_asc(category::Column::Name)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    /// Root ("principal") categories ordered by position.
    pub async fn roots(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .filter(category::Column::ParentId.is_null())
            .order_by_asc(category::Column::Position)
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn tree(&self) -> Result<Vec<CategoryNode>, ServiceError> {
        Ok(load_tree(&*self.db).await?.to_nested())
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        request: CreateCategoryRequest,
        actor: Option<Uuid>,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;
        let txn = self.db.begin().await?;

        if let Some(parent_id) = request.parent_id {
            if category::Entity::find_by_id(parent_id).one(&txn).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Parent category {} not found",
                    parent_id
                )));
            }
        }

        let position = match request.position {
            Some(position) => {
                open_slot(&txn, request.parent_id, position, None).await?;
                position
            }
            None => next_position(&txn, request.parent_id, None).await?,
        };

        let now = Utc::now();
        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            position: Set(position),
            parent_id: Set(request.parent_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(category_id = %created.id, position, "Category created");

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::CreateCategory,
                    format!("Created category {}", created.name),
                )
                .by(actor)
                .with_metadata(json!({ "categoryId": created.id, "parentId": created.parent_id })),
            )
            .await;

        Ok(created)
    }

    #[instrument(skip(self, request), fields(category_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateCategoryRequest,
        actor: Option<Uuid>,
    ) -> Result<category::Model, ServiceError> {
        request.validate()?;
        let txn = self.db.begin().await?;

        let tree = load_tree(&txn).await?;
        let current = tree
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;

        let parent_id = request.parent_id.unwrap_or(current.parent_id);
        if let Some(parent) = parent_id {
            if parent == id {
                return Err(ServiceError::ValidationError(
                    "A category cannot be its own parent".to_string(),
                ));
            }
            if !tree.contains(parent) {
                return Err(ServiceError::NotFound(format!(
                    "Parent category {} not found",
                    parent
                )));
            }
            if tree.is_descendant(parent, id) {
                return Err(ServiceError::ValidationError(
                    "A category cannot be moved under one of its own subcategories".to_string(),
                ));
            }
        }

        let parent_changed = parent_id != current.parent_id;
        let position = match request.position {
            Some(position) if parent_changed || position != current.position => {
                open_slot(&txn, parent_id, position, Some(id)).await?;
                position
            }
            Some(position) => position,
            None if parent_changed => next_position(&txn, parent_id, Some(id)).await?,
            None => current.position,
        };

        let mut active: category::ActiveModel = current.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        active.parent_id = Set(parent_id);
        active.position = Set(position);
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!(category_id = %id, position, "Category updated");

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::UpdateCategory,
                    format!("Updated category {}", updated.name),
                )
                .by(actor)
                .with_metadata(json!({ "categoryId": id, "parentId": updated.parent_id })),
            )
            .await;

        Ok(updated)
    }

    /// Assigns positions `1..=n` in the given order. The ids must be exactly the
    /// children of one parent.
    #[instrument(skip(self, request), fields(count = request.category_ids.len()))]
    pub async fn reorder(
        &self,
        request: ReorderCategoriesRequest,
        actor: Option<Uuid>,
    ) -> Result<Vec<category::Model>, ServiceError> {
        request.validate()?;
        let ids = request.category_ids;

        let mut unique = HashSet::new();
        if let Some(dup) = ids.iter().find(|id| !unique.insert(**id)) {
            return Err(ServiceError::ValidationError(format!(
                "Category {} appears more than once",
                dup
            )));
        }

        let txn = self.db.begin().await?;
        let tree = load_tree(&txn).await?;

        let mut parents = HashSet::new();
        for id in &ids {
            let node = tree
                .get(*id)
                .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?;
            parents.insert(node.parent_id);
        }
        if parents.len() != 1 {
            return Err(ServiceError::ValidationError(
                "All categories must share the same parent".to_string(),
            ));
        }
        let parent_id = parents.into_iter().next().flatten();

        let siblings: HashSet<Uuid> = match parent_id {
            Some(parent) => tree.children_of(parent).iter().map(|c| c.id).collect(),
            None => tree.roots().iter().map(|c| c.id).collect(),
        };
        if siblings != unique {
            return Err(ServiceError::ValidationError(
                "categoryIds must list every sibling exactly once".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let position = index as i32 + 1;
            let Some(node) = tree.get(*id).cloned() else {
                continue;
            };
            if node.position == position {
                reordered.push(node);
                continue;
            }
            let mut active: category::ActiveModel = node.into();
            active.position = Set(position);
            reordered.push(active.update(&txn).await?);
        }

        txn.commit().await?;
        info!(parent_id = ?parent_id, "Categories reordered");

        self.audit
            .record(
                AuditEntry::new(AuditAction::ReorderCategories, "Reordered categories")
                    .by(actor)
                    .with_metadata(json!({ "parentId": parent_id, "categoryIds": ids })),
            )
            .await;

        Ok(reordered)
    }

    /// Deletes a category. With `force`, the whole subtree goes too; without it a
    /// category that still has children is rejected. Returns the deleted ids.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete(
        &self,
        id: Uuid,
        force: bool,
        actor: Option<Uuid>,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let txn = self.db.begin().await?;
        let tree = load_tree(&txn).await?;

        let Some(target) = tree.get(id).cloned() else {
            return Err(ServiceError::NotFound(format!("Category {} not found", id)));
        };

        let child_count = tree.children_of(id).len();
        if child_count > 0 && !force {
            return Err(ServiceError::Conflict(format!(
                "Category {} has {} subcategories; delete with force=true to remove them",
                target.name, child_count
            )));
        }

        let doomed = if force { tree.post_order(id) } else { vec![id] };

        let referencing = product::Entity::find()
            .filter(product::Column::CategoryId.is_in(doomed.clone()))
            .count(&txn)
            .await?;
        if referencing > 0 {
            return Err(ServiceError::Conflict(format!(
                "{} products still reference this category",
                referencing
            )));
        }

        for doomed_id in &doomed {
            category::Entity::delete_by_id(*doomed_id).exec(&txn).await?;
        }

        txn.commit().await?;
        info!(category_id = %id, deleted = doomed.len(), "Category deleted");

        self.audit
            .record(
                AuditEntry::new(
                    AuditAction::DeleteCategory,
                    format!("Deleted category {}", target.name),
                )
                .by(actor)
                .with_metadata(json!({ "categoryId": id, "deletedIds": doomed, "force": force })),
            )
            .await;

        Ok(doomed)
    }
}
