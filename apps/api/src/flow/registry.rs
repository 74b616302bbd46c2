use std::collections::BTreeMap;
use std::sync::Arc;

use crate::flow::definition::FlowDefinition;
use crate::template::TemplateError;

/// Name → definition lookup, filled once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct FlowRegistry {
    flows: BTreeMap<String, Arc<FlowDefinition>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, flow: FlowDefinition) -> Result<(), TemplateError> {
        if self.flows.contains_key(flow.name()) {
            return Err(TemplateError::Definition(format!(
                "flow '{}' registered twice",
                flow.name()
            )));
        }
        self.flows.insert(flow.name().to_string(), Arc::new(flow));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(name).cloned()
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FlowDefinition> {
        self.flows.values().map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::definition::PromptSpec;
    use crate::schema::{FieldSpec, Schema};

    fn flow(name: &str) -> FlowDefinition {
        FlowDefinition::builder(name, "test flow")
            .input(Schema::new().field(FieldSpec::string("goal")))
            .output(Schema::new().field(FieldSpec::string("out")))
            .single(PromptSpec::text("{{goal}}", "out").unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_name() {
        let mut registry = FlowRegistry::new();
        registry.register(flow("b")).unwrap();
        registry.register(flow("a")).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_none());
        let names: Vec<_> = registry.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = FlowRegistry::new();
        registry.register(flow("a")).unwrap();
        assert!(matches!(
            registry.register(flow("a")),
            Err(TemplateError::Definition(_))
        ));
    }
}
