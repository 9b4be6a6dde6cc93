//! Minimal unit of work.
//!
//! [`EntityManager`] queues new entities and deletions for one entity type and
//! writes them on [`flush`](EntityManager::flush). It does not track changes
//! to loaded entities; use [`Repository::persist`] for updates.

use crate::client::Driver;
use crate::entity::{Entity, EntityCollection};
use crate::error::{OrmError, OrmResult};
use crate::repository::{ID_ATTRIBUTE, Repository};
use crate::value::{Filter, FilterValue, OrderBy, Record, Value};

/// What a flush wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub created: u64,
    pub deleted: u64,
}

pub struct EntityManager<'r, 'c, E: Entity, D> {
    repository: &'r Repository<'c, E, D>,
    new_entities: Vec<E>,
    deleted_ids: Vec<Value>,
}

impl<'r, 'c, E: Entity, D: Driver> EntityManager<'r, 'c, E, D> {
    pub fn new(repository: &'r Repository<'c, E, D>) -> Self {
        Self {
            repository,
            new_entities: Vec::new(),
            deleted_ids: Vec::new(),
        }
    }

    /// Queue `entity` for creation. Entities that already have an id are
    /// known to the store and are left alone.
    pub fn persist(&mut self, entity: E) -> OrmResult<()> {
        let id = self
            .repository
            .mapper()
            .attribute_value(&entity, ID_ATTRIBUTE)?;
        if id.is_empty() {
            self.new_entities.push(entity);
        }
        Ok(())
    }

    /// Queue the row of `entity` for deletion.
    pub fn delete(&mut self, entity: &E) -> OrmResult<()> {
        let id = self
            .repository
            .mapper()
            .attribute_value(entity, ID_ATTRIBUTE)?;
        if id.is_empty() {
            return Err(OrmError::validation(format!(
                "cannot delete a {} that has no id",
                E::NAME
            )));
        }
        if !self.deleted_ids.contains(&id) {
            self.deleted_ids.push(id);
        }
        Ok(())
    }

    pub async fn find(
        &self,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<u64>,
        offset: u64,
    ) -> OrmResult<EntityCollection<E>> {
        self.repository.find_by(filter, order_by, limit, offset).await
    }

    /// Number of queued creations and deletions.
    pub fn pending(&self) -> usize {
        self.new_entities.len() + self.deleted_ids.len()
    }

    /// Insert every queued entity as one bulk command, then delete every
    /// queued id with one statement.
    ///
    /// Queues are only cleared for the part that succeeded.
    pub async fn flush(&mut self) -> OrmResult<FlushReport> {
        let mapper = self.repository.mapper();
        let crud = self.repository.crud();
        let mut report = FlushReport::default();

        if !self.new_entities.is_empty() {
            let id_column = mapper.column_mapper().column_for(ID_ATTRIBUTE).to_string();
            let records = self
                .new_entities
                .iter()
                .map(|entity| {
                    let mut record = mapper.entity_to_record(entity)?;
                    record.shift_remove(&id_column);
                    Ok(record)
                })
                .collect::<OrmResult<Vec<Record>>>()?;
            report.created = crud.create_many(mapper.table_name(), &records).await?;
            self.new_entities.clear();
        }

        if !self.deleted_ids.is_empty() {
            let ids = self.deleted_ids.iter().cloned().map(FilterValue::from).collect();
            let mut filter = Filter::with_capacity(1);
            filter.insert(ID_ATTRIBUTE.to_string(), FilterValue::List(ids));
            report.deleted = self.repository.delete_by(&filter).await?;
            self.deleted_ids.clear();
        }

        tracing::debug!(
            target: "microrm.manager",
            entity = E::NAME,
            created = report.created,
            deleted = report.deleted,
            "flushed"
        );
        Ok(report)
    }
}

impl<E: Entity, D> Drop for EntityManager<'_, '_, E, D> {
    fn drop(&mut self) {
        let pending = self.new_entities.len() + self.deleted_ids.len();
        if pending > 0 {
            tracing::warn!(
                target: "microrm.manager",
                entity = E::NAME,
                pending,
                "entity manager dropped with unflushed work"
            );
        }
    }
}
