use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub name: String,
    pub value: Value,
}

/// Audit record of one calculation. Entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculationTrace {
    pub tables_used: Vec<TraceEntry>,
    pub intermediate_values: Vec<TraceEntry>,
    pub warnings: Vec<String>,
    pub assumptions: Vec<String>,
}

/// Collects trace entries when enabled and warnings always.
///
/// A disabled recorder keeps no trace state at all, so untraced calculations
/// pay only for the occasional degraded-path warning.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    trace: Option<CalculationTrace>,
    warnings: Vec<String>,
}

impl TraceRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            trace: enabled.then(CalculationTrace::default),
            warnings: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.trace.is_some()
    }

    pub fn table(&mut self, name: &str, detail: impl Into<Value>) {
        if let Some(trace) = self.trace.as_mut() {
            trace.tables_used.push(TraceEntry {
                name: name.to_string(),
                value: detail.into(),
            });
        }
    }

    pub fn value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(trace) = self.trace.as_mut() {
            trace.intermediate_values.push(TraceEntry {
                name: name.into(),
                value: value.into(),
            });
        }
    }

    /// Repeated assumptions are recorded once.
    pub fn assume(&mut self, assumption: impl Into<String>) {
        if let Some(trace) = self.trace.as_mut() {
            let assumption = assumption.into();
            if !trace.assumptions.contains(&assumption) {
                trace.assumptions.push(assumption);
            }
        }
    }

    /// Repeated warnings are recorded once.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.warnings.contains(&message) {
            return;
        }
        warn!(warning = %message, "degraded calculation path");
        if let Some(trace) = self.trace.as_mut() {
            trace.warnings.push(message.clone());
        }
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn finish(self) -> (Vec<String>, Option<CalculationTrace>) {
        (self.warnings, self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_recorder_keeps_only_warnings() {
        let mut recorder = TraceRecorder::disabled();
        recorder.table("scenarios", "excavation");
        recorder.value("combined_source_level_db", 106.8);
        recorder.assume("rural default");
        recorder.warn("geometric spreading fallback");

        let (warnings, trace) = recorder.finish();
        assert_eq!(warnings, vec!["geometric spreading fallback".to_string()]);
        assert!(trace.is_none());
    }

    #[test]
    fn enabled_recorder_appends_in_order() {
        let mut recorder = TraceRecorder::new(true);
        recorder.value("received_level_db", 60.0);
        recorder.value("received_level_db", 57.0);
        recorder.warn("fallback");

        let (_, trace) = recorder.finish();
        let trace = trace.expect("trace enabled");
        let values: Vec<_> = trace
            .intermediate_values
            .iter()
            .map(|entry| entry.value.as_f64())
            .collect();
        assert_eq!(values, vec![Some(60.0), Some(57.0)]);
        assert_eq!(trace.warnings, vec!["fallback".to_string()]);
    }
}
