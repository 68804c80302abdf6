#![allow(dead_code)]

use fleetgate_core::{Backend, BackendError, Error, Kwargs, Options, Result, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Backend double returning canned values and recording every call.
#[derive(Default)]
pub struct RecordingBackend {
    results: BTreeMap<String, Value>,
    failing: Vec<String>,
    calls: Mutex<Vec<(String, Kwargs)>>,
    options: Mutex<Options>,
    exits: Mutex<usize>,
    fail_exit: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(mut self, operation: &str, value: Value) -> Self {
        self.results.insert(operation.to_string(), value);
        self
    }

    pub fn failing(mut self, operation: &str) -> Self {
        self.results.insert(operation.to_string(), Value::None);
        self.failing.push(operation.to_string());
        self
    }

    pub fn failing_exit(mut self) -> Self {
        self.fail_exit = true;
        self
    }

    pub fn with_option(self, key: &str, value: serde_json::Value) -> Self {
        self.options.lock().unwrap().insert(key.to_string(), value);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<(String, Kwargs)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn exit_count(&self) -> usize {
        *self.exits.lock().unwrap()
    }

    pub fn options(&self) -> Options {
        self.options.lock().unwrap().clone()
    }
}

impl Backend for RecordingBackend {
    fn operations(&self) -> Vec<String> {
        self.results.keys().cloned().collect()
    }

    fn invoke(&self, operation: &str, kwargs: &Kwargs) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((operation.to_string(), kwargs.clone()));
        if self.failing.iter().any(|op| op == operation) {
            return Err(BackendError::new(format!("{operation} failed")).into());
        }
        self.results
            .get(operation)
            .cloned()
            .ok_or_else(|| Error::unknown_operation(operation))
    }

    fn set_options(&self, options: &Options) -> Result<()> {
        self.options.lock().unwrap().extend(options.clone());
        Ok(())
    }

    fn get_options(&self) -> Result<Options> {
        Ok(self.options())
    }

    fn exit(&self) -> Result<()> {
        *self.exits.lock().unwrap() += 1;
        if self.fail_exit {
            return Err(BackendError::new("exit failed").into());
        }
        Ok(())
    }
}

pub fn json(value: serde_json::Value) -> Value {
    Value::from(value)
}

pub fn kwargs(pairs: &[(&str, Value)]) -> Kwargs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
