//! Entity-shaped finders and writers.
//!
//! A [`Repository`] pairs a [`DataMapper`] with a borrowed [`CrudClient`].
//! Filters and orderings are given in attribute names and translated to
//! columns before the query is rendered.

use crate::builder::DEFAULT_OFFSET;
use crate::client::Driver;
use crate::crud::CrudClient;
use crate::entity::{Entity, EntityCollection};
use crate::error::{OrmError, OrmResult};
use crate::mapper::DataMapper;
use crate::value::{Filter, FilterValue, OrderBy, Record, Value};

/// Name of the identifier attribute every persisted entity carries.
pub const ID_ATTRIBUTE: &str = "id";

pub struct Repository<'c, E: Entity, D> {
    crud: &'c CrudClient<D>,
    mapper: DataMapper<E>,
}

impl<'c, E: Entity, D: Driver> Repository<'c, E, D> {
    pub fn new(crud: &'c CrudClient<D>, mapper: DataMapper<E>) -> Self {
        Self { crud, mapper }
    }

    pub fn mapper(&self) -> &DataMapper<E> {
        &self.mapper
    }

    pub fn crud(&self) -> &'c CrudClient<D> {
        self.crud
    }

    pub async fn find_all(&self) -> OrmResult<EntityCollection<E>> {
        self.find_by(&Filter::new(), &OrderBy::new(), None, DEFAULT_OFFSET)
            .await
    }

    pub async fn find_one_by_id(&self, id: i64) -> OrmResult<E> {
        self.find_one_by(&id_filter(Value::Int(id))).await
    }

    /// Find the single entity matching `filter`.
    ///
    /// Fails with [`OrmError::NotFound`] when nothing matches and with
    /// [`OrmError::AmbiguousResult`] when more than one row does.
    pub async fn find_one_by(&self, filter: &Filter) -> OrmResult<E> {
        let found = self
            .find_by(filter, &OrderBy::new(), None, DEFAULT_OFFSET)
            .await?;
        match found.len() {
            0 => Err(OrmError::not_found(format!(
                "Should find exactly one {} and found 0",
                E::NAME
            ))),
            1 => found.into_iter().next().ok_or_else(|| {
                OrmError::not_found(format!("Should find exactly one {} and found 0", E::NAME))
            }),
            n => Err(OrmError::AmbiguousResult { found: n }),
        }
    }

    /// Find entities by attribute filter, ordered by attribute names.
    pub async fn find_by(
        &self,
        filter: &Filter,
        order_by: &OrderBy,
        limit: Option<u64>,
        offset: u64,
    ) -> OrmResult<EntityCollection<E>> {
        let columns = self.mapper.properties_to_columns(filter)?;
        let order_by = self.mapper.order_by_to_columns(order_by);
        let records = self
            .crud
            .read(self.mapper.table_name(), &columns, &order_by, limit, offset)
            .await?;
        self.mapper.record_list_to_entity_collection(&records)
    }

    /// Insert `entity` if its id is empty, otherwise update it by id.
    ///
    /// The id column is never written. Afterwards the row is read back and
    /// copied into `entity`, so a new entity receives its generated id.
    /// Returns the number of rows written.
    pub async fn persist(&self, entity: &mut E) -> OrmResult<u64> {
        let table = self.mapper.table_name();
        let id_column = self
            .mapper
            .column_mapper()
            .column_for(ID_ATTRIBUTE)
            .to_string();
        let mut record = self.mapper.entity_to_record(entity)?;
        record.shift_remove(&id_column);

        let id = self.mapper.attribute_value(entity, ID_ATTRIBUTE)?;
        let (affected, id) = if id.is_empty() {
            self.insert(table, &record, &id_column).await?
        } else if record.is_empty() {
            (0, id)
        } else {
            let filter = self.mapper.properties_to_columns(&id_filter(id.clone()))?;
            (self.crud.update(table, &filter, &record).await?, id)
        };

        let filter = self.mapper.properties_to_columns(&id_filter(id))?;
        let rows = self
            .crud
            .read(table, &filter, &OrderBy::new(), None, DEFAULT_OFFSET)
            .await?;
        let row = rows.first().ok_or_else(|| {
            OrmError::not_found(format!("persisted {} row is missing from '{table}'", E::NAME))
        })?;
        self.mapper.update_entity_from_record(entity, row)?;

        Ok(affected)
    }

    /// Insert `record` and return the affected count with the generated id.
    ///
    /// Dialects with `RETURNING` read the id back from the INSERT itself;
    /// others ask the driver for the last generated id.
    async fn insert(
        &self,
        table: &str,
        record: &Record,
        id_column: &str,
    ) -> OrmResult<(u64, Value)> {
        let missing_id =
            || OrmError::Other(format!("no id was generated for the new row in '{table}'"));

        if self.crud.builder().dialect().returning {
            let rows = self.crud.create_returning(table, record, id_column).await?;
            let id = rows
                .first()
                .and_then(|row| row.get(id_column))
                .and_then(Value::as_i64)
                .ok_or_else(missing_id)?;
            return Ok((rows.len() as u64, Value::Int(id)));
        }

        let affected = self.crud.create(table, record).await?;
        let id = self.crud.last_insert_id().await?.ok_or_else(missing_id)?;
        Ok((affected, Value::Int(id)))
    }

    pub async fn delete_by_id(&self, id: i64) -> OrmResult<u64> {
        self.delete_by(&id_filter(Value::Int(id))).await
    }

    /// Delete by attribute filter and return the number of deleted rows.
    pub async fn delete_by(&self, filter: &Filter) -> OrmResult<u64> {
        let columns = self.mapper.properties_to_columns(filter)?;
        self.crud.delete(self.mapper.table_name(), &columns).await
    }

    /// Delete the row of a persisted entity.
    pub async fn delete(&self, entity: &E) -> OrmResult<u64> {
        let id = self.mapper.attribute_value(entity, ID_ATTRIBUTE)?;
        if id.is_empty() {
            return Err(OrmError::validation(format!(
                "cannot delete a {} that has no id",
                E::NAME
            )));
        }
        self.delete_by(&id_filter(id)).await
    }
}

fn id_filter(id: Value) -> Filter {
    let mut filter = Filter::with_capacity(1);
    filter.insert(ID_ATTRIBUTE.to_string(), FilterValue::from(id));
    filter
}
