//! Opaque calculation inputs
//!
//! A `CalcInput` describes one invocation of the simulation code: a
//! structure plus a flat map of solver variables. The assembly layer never
//! interprets the variables, it only threads inputs through to tasks.

use std::collections::BTreeMap;
use std::fmt;

use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inputs::structure::Structure;

/// One serializable simulation input: structure + variable map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcInput {
    pub structure: Structure,
    vars: BTreeMap<String, Value>,
}

impl CalcInput {
    pub fn new(structure: Structure) -> Self {
        Self {
            structure,
            vars: BTreeMap::new(),
        }
    }

    /// Set a single variable, overwriting any previous value.
    pub fn set_var<K: Into<String>, V: Serialize>(&mut self, key: K, value: V) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.vars.insert(key.into(), json_value);
        }
    }

    /// Merge a map of extra variables, later entries winning.
    pub fn set_vars(&mut self, extra: &BTreeMap<String, Value>) {
        for (key, value) in extra {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    /// Chaining variant of [`set_var`], for factory code.
    pub fn with_var<K: Into<String>, V: Serialize>(mut self, key: K, value: V) -> Self {
        self.set_var(key, value);
        self
    }
}

/// A cloneable transform applied to a generated calculation input.
///
/// Decorators are applied by straight functional composition, in list
/// order, after factory generation.
pub trait InputDecorator: DynClone + fmt::Debug + Send + Sync {
    fn decorate(&self, input: CalcInput) -> CalcInput;
}

dyn_clone::clone_trait_object!(InputDecorator);

/// Apply `decorators` to `input` in list order.
pub fn apply_decorators(mut input: CalcInput, decorators: &[Box<dyn InputDecorator>]) -> CalcInput {
    for decorator in decorators {
        input = decorator.decorate(input);
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn si_structure() -> Structure {
        Structure::from_sites(
            [[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]],
            vec![("Si", [0.0, 0.0, 0.0]), ("Si", [0.25, 0.25, 0.25])],
        )
    }

    #[derive(Debug, Clone)]
    struct SetEcut(f64);

    impl InputDecorator for SetEcut {
        fn decorate(&self, input: CalcInput) -> CalcInput {
            input.with_var("ecut", self.0)
        }
    }

    #[test]
    fn test_set_vars_merges() {
        let mut input = CalcInput::new(si_structure());
        input.set_var("ecut", 10.0);
        let mut extra = BTreeMap::new();
        extra.insert("ecut".to_string(), json!(12.0));
        extra.insert("nband".to_string(), json!(8));
        input.set_vars(&extra);
        assert_eq!(input.var("ecut"), Some(&json!(12.0)));
        assert_eq!(input.var("nband"), Some(&json!(8)));
    }

    #[test]
    fn test_decorators_compose_in_order() {
        let input = CalcInput::new(si_structure());
        let decorators: Vec<Box<dyn InputDecorator>> =
            vec![Box::new(SetEcut(8.0)), Box::new(SetEcut(16.0))];
        let decorated = apply_decorators(input, &decorators);
        assert_eq!(decorated.var("ecut"), Some(&json!(16.0)));
    }

    #[test]
    fn test_round_trip() {
        let input = CalcInput::new(si_structure()).with_var("tolvrs", 1e-10);
        let text = serde_json::to_string(&input).unwrap();
        let back: CalcInput = serde_json::from_str(&text).unwrap();
        assert_eq!(back, input);
    }
}
