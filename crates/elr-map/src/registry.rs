//! Mapper lookup by name.

use std::collections::HashMap;
use std::sync::Arc;

use elr_model::Schema;
use tracing::debug;

use crate::builtin::{
    CoalesceMapper, ConcatMapper, IfNotPresentMapper, IfPresentMapper, IfThenElseMapper,
    LookupMapper, MiddleInitialMapper, SplitByCommaMapper, SplitMapper,
    StripNonNumericMapper, StripNumericMapper, StripPhoneFormattingMapper, TimestampMapper,
    TrimBlanksMapper, UseMapper,
};
use crate::error::{MapperError, Result};
use crate::mapper::Mapper;

/// Named mappers available to schemas.
#[derive(Clone, Default)]
pub struct MapperRegistry {
    mappers: HashMap<&'static str, Arc<dyn Mapper>>,
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.mappers.keys().collect();
        names.sort();
        f.debug_struct("MapperRegistry")
            .field("mappers", &names)
            .finish()
    }
}

impl MapperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in mapper.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(UseMapper);
        registry.register(CoalesceMapper);
        registry.register(ConcatMapper);
        registry.register(MiddleInitialMapper);
        registry.register(IfPresentMapper);
        registry.register(IfNotPresentMapper);
        registry.register(IfThenElseMapper);
        registry.register(TrimBlanksMapper);
        registry.register(StripPhoneFormattingMapper);
        registry.register(StripNonNumericMapper);
        registry.register(StripNumericMapper);
        registry.register(SplitMapper);
        registry.register(SplitByCommaMapper);
        registry.register(TimestampMapper);
        registry.register(LookupMapper);
        registry
    }

    /// Add or replace a mapper under its own name.
    pub fn register<M: Mapper + 'static>(&mut self, mapper: M) {
        self.mappers.insert(mapper.name(), Arc::new(mapper));
    }

    pub fn find(&self, name: &str) -> Option<&dyn Mapper> {
        self.mappers.get(name).map(Arc::as_ref)
    }

    /// Mapper by name; `element` labels the error.
    pub fn get(&self, name: &str, element: &str) -> Result<&dyn Mapper> {
        self.find(name).ok_or_else(|| MapperError::UnknownMapper {
            name: name.to_string(),
            element: element.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.mappers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Check that every mapper a schema references exists and accepts its arguments.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        for element in schema.elements() {
            if let Some(name) = &element.mapper_ref {
                let mapper = self.get(name, &element.name)?;
                mapper.value_names(element, &element.mapper_args)?;
            }
        }
        debug!(schema = schema.name(), "validated mappers");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elr_model::{Element, ElementType};

    #[test]
    fn test_builtins_registered() {
        let registry = MapperRegistry::with_builtins();
        assert!(registry.find("concat").is_some());
        assert!(registry.find("Concat").is_none());
        assert_eq!(registry.names().len(), 15);
    }

    #[test]
    fn test_validate_reports_unknown_mapper() {
        let registry = MapperRegistry::with_builtins();
        let schema = Schema::new(
            "s",
            "t",
            vec![Element::new("a", ElementType::Text).with_mapper("nope", &["b"])],
        )
        .expect("schema");
        let err = registry.validate(&schema).unwrap_err();
        assert!(matches!(err, MapperError::UnknownMapper { .. }));
        assert_eq!(err.to_string(), "unknown mapper 'nope' on element a");
    }

    #[test]
    fn test_validate_checks_arguments() {
        let registry = MapperRegistry::with_builtins();
        let schema = Schema::new(
            "s",
            "t",
            vec![Element::new("a", ElementType::Text).with_mapper("ifPresent", &["b"])],
        )
        .expect("schema");
        assert!(matches!(
            registry.validate(&schema),
            Err(MapperError::ArgumentCount { .. })
        ));
    }
}
