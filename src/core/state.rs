//! RS-007: Session state: one bound model plus the script variable store.

use super::model::Model;
use super::types::Value;
use indexmap::IndexMap;

/// Script-produced variables, kept in first-insertion order.
///
/// Only the script executor writes here; overwriting a name keeps its
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptVariableStore {
    vars: IndexMap<String, Value>,
}

impl ScriptVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }
}

/// A live model binding and its accumulated script state.
///
/// Created once per "run model" action; dropped when a new model is chosen.
pub struct Session {
    id: String,
    model: Box<dyn Model>,
    periods: Vec<String>,
    store: ScriptVariableStore,
    computed: bool,
}

impl Session {
    pub(crate) fn new(id: String, model: Box<dyn Model>, periods: Vec<String>) -> Self {
        Self {
            id,
            model,
            periods,
            store: ScriptVariableStore::new(),
            computed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub(crate) fn model_mut(&mut self) -> &mut dyn Model {
        self.model.as_mut()
    }

    /// Period labels from the bound dataset.
    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn store(&self) -> &ScriptVariableStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ScriptVariableStore {
        &mut self.store
    }

    /// Whether the model's compute entry point has completed.
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub(crate) fn mark_computed(&mut self) {
        self.computed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::tests::economy_registry;

    #[test]
    fn test_rs007_store_insertion_order() {
        let mut store = ScriptVariableStore::new();
        store.insert("ZETA", Value::Scalar(1.0));
        store.insert("ALPHA", Value::Scalar(2.0));
        store.insert("ZETA", Value::Scalar(3.0));
        let names: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["ZETA", "ALPHA"]);
        assert_eq!(store.get("ZETA"), Some(&Value::Scalar(3.0)));
        assert_eq!(store.len(), 2);
        assert!(store.contains("ALPHA"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_rs007_session_accessors() {
        let model = economy_registry().instantiate("Economy").unwrap();
        let mut session = Session::new("s-1".to_string(), model, vec!["2020".to_string()]);
        assert_eq!(session.id(), "s-1");
        assert_eq!(session.model().model_id(), "Economy");
        assert_eq!(session.periods(), ["2020".to_string()]);
        assert!(session.store().is_empty());
        assert!(!session.is_computed());
        session.mark_computed();
        assert!(session.is_computed());
    }
}
