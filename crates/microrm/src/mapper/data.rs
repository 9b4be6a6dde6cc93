use super::{ColumnMapper, MappingConfig};
use crate::coercion::{SemanticType, TypeCoercer};
use crate::entity::{AccessorTable, Entity, EntityCollection};
use crate::error::{OrmError, OrmResult};
use crate::value::{Filter, FilterValue, OrderBy, Record, Value};
use std::collections::HashSet;
use std::fmt;

/// Converts entities of type `E` to and from storage records.
pub struct DataMapper<E: Entity> {
    config: MappingConfig,
    columns: ColumnMapper,
    coercer: TypeCoercer,
    accessors: AccessorTable<E>,
}

impl<E: Entity> DataMapper<E> {
    /// Validate `config` against `E` and build the mapper.
    ///
    /// Fails with [`OrmError::MappingConfig`] on an empty table name, an
    /// unknown type name, an invalid timestamp format, or when two attributes
    /// end up on the same column.
    pub fn new(config: MappingConfig) -> OrmResult<Self> {
        if config.table_name.trim().is_empty() {
            return Err(OrmError::mapping_config(format!(
                "entity '{}' has an empty table name",
                config.entity_name
            )));
        }

        let columns = ColumnMapper::new(&config.attributes)?;
        let coercer = TypeCoercer::new(config.timestamp_format.clone())?;
        let accessors = AccessorTable::<E>::new();

        let mut seen = HashSet::new();
        for accessor in accessors.iter() {
            let column = columns.column_for(accessor.name);
            if !seen.insert(column.to_string()) {
                return Err(OrmError::mapping_config(format!(
                    "column '{column}' of '{}' is mapped by more than one attribute",
                    config.table_name
                )));
            }
        }

        Ok(Self {
            config,
            columns,
            coercer,
            accessors,
        })
    }

    pub fn entity_name(&self) -> &str {
        &self.config.entity_name
    }

    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    pub fn repository_type(&self) -> &str {
        &self.config.repository_type
    }

    pub fn collection_type(&self) -> &str {
        &self.config.collection_type
    }

    pub fn timestamp_format(&self) -> &str {
        self.coercer.timestamp_format()
    }

    pub fn column_mapper(&self) -> &ColumnMapper {
        &self.columns
    }

    /// Effective type of `attribute`: the declared one, else the field's own.
    pub fn attribute_type(&self, attribute: &str) -> SemanticType {
        self.columns
            .declared_type(attribute)
            .or_else(|| self.accessors.find(attribute).map(|a| a.kind))
            .unwrap_or_default()
    }

    /// Read every attribute of `entity` into a storage record.
    pub fn entity_to_record(&self, entity: &E) -> OrmResult<Record> {
        if let Some(missing) = self
            .columns
            .configured_attributes()
            .find(|attr| !self.accessors.contains(attr))
        {
            return Err(OrmError::introspection(format!(
                "entity '{}' has no attribute '{missing}'",
                E::NAME
            )));
        }

        let mut record = Record::with_capacity(self.accessors.len());
        for accessor in self.accessors.iter() {
            let value = (accessor.get)(entity);
            let raw = self
                .coercer
                .to_storage(value, self.attribute_type(accessor.name))?;
            record.insert(self.columns.column_for(accessor.name).to_string(), raw);
        }
        Ok(record)
    }

    /// Build a new entity from a storage record.
    pub fn record_to_entity(&self, record: &Record) -> OrmResult<E> {
        let mut entity = E::default();
        self.update_entity_from_record(&mut entity, record)?;
        Ok(entity)
    }

    /// Overwrite the attributes of `entity` whose columns appear in `record`.
    ///
    /// Columns with no matching attribute are ignored.
    pub fn update_entity_from_record(&self, entity: &mut E, record: &Record) -> OrmResult<()> {
        for accessor in self.accessors.iter() {
            let Some(raw) = record.get(self.columns.column_for(accessor.name)) else {
                continue;
            };
            let value = self
                .coercer
                .to_entity(raw.clone(), self.attribute_type(accessor.name))?;
            self.accessors.set(entity, accessor.name, value)?;
        }
        Ok(())
    }

    /// Rename filter keys to columns and convert values to storage form.
    ///
    /// Lists are converted element by element, keeping their nesting.
    pub fn properties_to_columns(&self, filter: &Filter) -> OrmResult<Filter> {
        let mut out = Filter::with_capacity(filter.len());
        for (attribute, value) in filter {
            let ty = self.attribute_type(attribute);
            out.insert(
                self.columns.column_for(attribute).to_string(),
                self.filter_value_to_storage(value, ty)?,
            );
        }
        Ok(out)
    }

    /// Rename order-by keys to columns.
    pub fn order_by_to_columns(&self, order_by: &OrderBy) -> OrderBy {
        order_by
            .iter()
            .map(|(attr, dir)| (self.columns.column_for(attr).to_string(), *dir))
            .collect()
    }

    /// Convert records to entities, keeping order.
    pub fn record_list_to_entity_collection(
        &self,
        records: &[Record],
    ) -> OrmResult<EntityCollection<E>> {
        let items = records
            .iter()
            .map(|r| self.record_to_entity(r))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(EntityCollection::new(self.config.collection_type.clone(), items))
    }

    /// Convert entities to records, keeping order.
    pub fn entity_collection_to_record_list<'a, I>(&self, entities: I) -> OrmResult<Vec<Record>>
    where
        I: IntoIterator<Item = &'a E>,
    {
        entities
            .into_iter()
            .map(|e| self.entity_to_record(e))
            .collect()
    }

    /// Current value of `attribute` on `entity`, as the entity holds it.
    pub fn attribute_value(&self, entity: &E, attribute: &str) -> OrmResult<Value> {
        self.accessors.get(entity, attribute)
    }

    fn filter_value_to_storage(
        &self,
        value: &FilterValue,
        ty: SemanticType,
    ) -> OrmResult<FilterValue> {
        Ok(match value {
            FilterValue::Null => FilterValue::Null,
            FilterValue::Scalar(v) => FilterValue::from(self.coercer.to_storage(v.clone(), ty)?),
            FilterValue::List(items) => FilterValue::List(
                items
                    .iter()
                    .map(|item| self.filter_value_to_storage(item, ty))
                    .collect::<OrmResult<_>>()?,
            ),
        })
    }
}

impl<E: Entity> fmt::Debug for DataMapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMapper")
            .field("entity", &E::NAME)
            .field("table", &self.config.table_name)
            .field("accessors", &self.accessors)
            .finish()
    }
}
