//! RS-005: Model capability, field-descriptor tables, and the model registry.
//!
//! A model type declares its bindable fields once, through a [`FieldTable`]
//! builder, at registration time. Every instance shares that table; the engine
//! reads and writes fields by name through the [`Model`] trait and never needs
//! to know the concrete model type.

use super::error::EngineError;
use super::types::{FieldDescriptor, FieldKind, FieldValue};
use indexmap::IndexMap;
use std::sync::Arc;

/// What the engine requires from a model instance.
pub trait Model {
    /// Registry identifier this instance was created under.
    fn model_id(&self) -> &str;

    /// Bindable fields in declaration order.
    fn descriptors(&self) -> &[FieldDescriptor];

    fn get_field(&self, name: &str) -> Result<FieldValue, EngineError>;

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EngineError>;

    /// Run the model's single compute entry point.
    fn compute(&mut self) -> Result<(), EngineError>;

    /// Kind of a declared field, or None when the model has no such field.
    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.descriptors()
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.kind)
    }
}

// ============================================================================
// Field tables
// ============================================================================

type SeriesView<M> = fn(&M) -> &Option<Vec<f64>>;
type SeriesSlot<M> = fn(&mut M) -> &mut Option<Vec<f64>>;
type ComputeFn<M> = fn(&mut M) -> Result<(), String>;

enum Accessor<M> {
    PeriodCount {
        get: fn(&M) -> usize,
        set: fn(&mut M, usize),
    },
    Series {
        view: SeriesView<M>,
        slot: SeriesSlot<M>,
    },
}

/// Declared bindable fields and compute entry point for one model type.
pub struct FieldTable<M> {
    descriptors: Vec<FieldDescriptor>,
    accessors: IndexMap<String, Accessor<M>>,
    compute: Option<ComputeFn<M>>,
}

impl<M> FieldTable<M> {
    pub fn builder() -> FieldTableBuilder<M> {
        FieldTableBuilder {
            descriptors: Vec::new(),
            accessors: IndexMap::new(),
            compute: None,
            duplicates: Vec::new(),
        }
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }
}

/// Builder collecting field declarations in order.
pub struct FieldTableBuilder<M> {
    descriptors: Vec<FieldDescriptor>,
    accessors: IndexMap<String, Accessor<M>>,
    compute: Option<ComputeFn<M>>,
    duplicates: Vec<String>,
}

impl<M> FieldTableBuilder<M> {
    /// Declare the period-count field (conventionally `LL`).
    pub fn period_count(self, name: &str, get: fn(&M) -> usize, set: fn(&mut M, usize)) -> Self {
        self.declare(name, FieldKind::PeriodCount, Accessor::PeriodCount { get, set })
    }

    /// Declare a numeric-series field backed by an `Option<Vec<f64>>` slot.
    pub fn series(self, name: &str, view: SeriesView<M>, slot: SeriesSlot<M>) -> Self {
        self.declare(name, FieldKind::Series, Accessor::Series { view, slot })
    }

    /// Set the compute entry point.
    pub fn compute(mut self, entry: ComputeFn<M>) -> Self {
        self.compute = Some(entry);
        self
    }

    fn declare(mut self, name: &str, kind: FieldKind, accessor: Accessor<M>) -> Self {
        if self.accessors.contains_key(name) {
            self.duplicates.push(name.to_string());
            return self;
        }
        self.descriptors.push(FieldDescriptor {
            name: name.to_string(),
            kind,
        });
        self.accessors.insert(name.to_string(), accessor);
        self
    }

    /// Finish the table. Fails if any field name was declared twice.
    pub fn build(self) -> Result<FieldTable<M>, EngineError> {
        if !self.duplicates.is_empty() {
            return Err(EngineError::IllegalState(format!(
                "duplicate bindable field(s): {}",
                self.duplicates.join(", ")
            )));
        }
        Ok(FieldTable {
            descriptors: self.descriptors,
            accessors: self.accessors,
            compute: self.compute,
        })
    }
}

// ============================================================================
// Bound model instances
// ============================================================================

/// A model state paired with its shared field table.
pub struct BoundModel<M> {
    id: String,
    state: M,
    table: Arc<FieldTable<M>>,
}

impl<M> BoundModel<M> {
    pub fn new(id: &str, state: M, table: Arc<FieldTable<M>>) -> Self {
        Self {
            id: id.to_string(),
            state,
            table,
        }
    }
}

impl<M> Model for BoundModel<M> {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn descriptors(&self) -> &[FieldDescriptor] {
        self.table.descriptors()
    }

    fn get_field(&self, name: &str) -> Result<FieldValue, EngineError> {
        match self.table.accessors.get(name) {
            Some(Accessor::PeriodCount { get, .. }) => Ok(FieldValue::Periods(get(&self.state))),
            Some(Accessor::Series { view, .. }) => Ok(view(&self.state)
                .clone()
                .map(FieldValue::Series)
                .unwrap_or(FieldValue::Unset)),
            None => Err(EngineError::FieldAccess {
                field: name.to_string(),
                reason: format!("model '{}' declares no such field", self.id),
            }),
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), EngineError> {
        let accessor = self
            .table
            .accessors
            .get(name)
            .ok_or_else(|| EngineError::FieldBinding {
                field: name.to_string(),
                reason: format!("model '{}' declares no such field", self.id),
            })?;

        match (accessor, value) {
            (Accessor::PeriodCount { set, .. }, FieldValue::Periods(n)) => set(&mut self.state, n),
            (Accessor::Series { slot, .. }, FieldValue::Series(v)) => {
                *slot(&mut self.state) = Some(v)
            }
            (Accessor::Series { slot, .. }, FieldValue::Unset) => *slot(&mut self.state) = None,
            (accessor, other) => {
                let expected = match accessor {
                    Accessor::PeriodCount { .. } => FieldKind::PeriodCount,
                    Accessor::Series { .. } => FieldKind::Series,
                };
                let got = other
                    .kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unset".to_string());
                return Err(EngineError::FieldBinding {
                    field: name.to_string(),
                    reason: format!("expected {}, got {}", expected, got),
                });
            }
        }
        Ok(())
    }

    fn compute(&mut self) -> Result<(), EngineError> {
        let entry = self.table.compute.ok_or_else(|| EngineError::ModelExecution {
            model: self.id.clone(),
            reason: "no compute entry point declared".to_string(),
        })?;
        entry(&mut self.state).map_err(|reason| EngineError::ModelExecution {
            model: self.id.clone(),
            reason,
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

type Constructor = Box<dyn Fn() -> Result<Box<dyn Model>, String> + Send + Sync>;

struct RegistryEntry {
    descriptors: Vec<FieldDescriptor>,
    construct: Constructor,
}

/// Maps model identifiers to constructors.
#[derive(Default)]
pub struct ModelRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model type whose initial state is `M::default()`.
    pub fn register<M: Default + 'static>(
        &mut self,
        id: &str,
        table: FieldTable<M>,
    ) -> Result<(), EngineError> {
        self.register_with(id, table, || Ok(M::default()))
    }

    /// Register a model type with a fallible constructor.
    pub fn register_with<M: 'static>(
        &mut self,
        id: &str,
        table: FieldTable<M>,
        make: fn() -> Result<M, String>,
    ) -> Result<(), EngineError> {
        if self.entries.contains_key(id) {
            return Err(EngineError::ModelInstantiation {
                model: id.to_string(),
                reason: "identifier already registered".to_string(),
            });
        }
        let descriptors = table.descriptors().to_vec();
        let table = Arc::new(table);
        let model_id = id.to_string();
        let construct: Constructor = Box::new(move || {
            let state = make()?;
            Ok(Box::new(BoundModel::new(&model_id, state, Arc::clone(&table))) as Box<dyn Model>)
        });
        self.entries.insert(
            id.to_string(),
            RegistryEntry {
                descriptors,
                construct,
            },
        );
        Ok(())
    }

    /// Create a fresh instance of a registered model.
    pub fn instantiate(&self, id: &str) -> Result<Box<dyn Model>, EngineError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| EngineError::ModelInstantiation {
                model: id.to_string(),
                reason: format!("unknown model identifier (known: {})", self.known()),
            })?;
        (entry.construct)().map_err(|reason| EngineError::ModelInstantiation {
            model: id.to_string(),
            reason,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Field descriptors of a registered model.
    pub fn describe(&self, id: &str) -> Option<&[FieldDescriptor]> {
        self.entries.get(id).map(|e| e.descriptors.as_slice())
    }

    fn known(&self) -> String {
        if self.entries.is_empty() {
            return "none".to_string();
        }
        self.ids().collect::<Vec<_>>().join(", ")
    }
}
