//! Declarative report definitions
//!
//! A report is an ordered list of steps read from the `[[reports]]` section
//! of the configuration file:
//!
//! ```toml
//! [[reports]]
//! name = "jarp"
//! group = "monthly"
//! file_prefix = "jarp_"
//!
//! [[reports.steps]]
//! kind = "fetch"
//! alias = "invoice"
//! endpoint = "p21_view_invoice_hdr"
//! select = ["invoice_no", "invoice_date", "bill2_name"]
//! filters = ["(ship_to_id eq 12755 or ship_to_id eq 15097)"]
//! date_window = true
//! date_field = "invoice_date"
//!
//! [[reports.steps]]
//! kind = "fetch"
//! alias = "line"
//! endpoint = "p21_view_invoice_line"
//! select = ["invoice_no", "item_id", "qty_shipped"]
//! keys = { from = "invoice", fields = [{ source = "invoice_no" }] }
//!
//! [[reports.steps]]
//! kind = "join"
//! left = "invoice"
//! right = "line"
//! on = ["invoice_no"]
//! into = "report"
//!
//! [[reports.outputs]]
//! dataset = "report"
//! part = "report"
//! columns = ["bill2_name", "invoice_no", "item_id", "qty_shipped"]
//! sort_by = ["invoice_date"]
//! ```

use serde::{Deserialize, Serialize};

/// One report pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Unique report name
    pub name: String,

    /// Group used for run selection
    #[serde(default)]
    pub group: Option<String>,

    /// File name prefix; defaults to `<name>_`
    #[serde(default)]
    pub file_prefix: Option<String>,

    /// Steps executed in order
    pub steps: Vec<StepDefinition>,

    /// Final datasets handed to the sink
    #[serde(default)]
    pub outputs: Vec<OutputDefinition>,
}

/// A single pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepDefinition {
    Fetch(FetchStep),
    Join(JoinStep),
}

impl StepDefinition {
    /// Alias of the dataset this step produces
    pub fn alias(&self) -> &str {
        match self {
            StepDefinition::Fetch(step) => &step.alias,
            StepDefinition::Join(step) => &step.into,
        }
    }
}

/// Fetch one view into a named dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchStep {
    pub alias: String,
    pub endpoint: String,
    pub select: Vec<String>,

    #[serde(default)]
    pub filters: Vec<String>,

    #[serde(default)]
    pub order_by: Vec<String>,

    /// Apply the run's date window to `date_field`
    #[serde(default)]
    pub date_window: bool,

    #[serde(default)]
    pub date_field: Option<String>,

    /// Use the `lookback_days` before the window start instead of the window
    #[serde(default)]
    pub lookback_days: Option<u32>,

    #[serde(default)]
    pub page_size: Option<usize>,

    /// Restrict this fetch to keys found in an earlier dataset
    #[serde(default)]
    pub keys: Option<KeySource>,

    /// Keep only the first record per combination of these fields
    #[serde(default)]
    pub distinct_on: Vec<String>,

    /// Keep going with an empty dataset instead of stopping the report
    #[serde(default)]
    pub optional: bool,

    /// Part name used when intermediate datasets are exported
    #[serde(default)]
    pub export_part: Option<String>,
}

/// Where the key set for a filtered fetch comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySource {
    /// Alias of an earlier dataset
    pub from: String,

    /// One disjunction is built per field
    pub fields: Vec<KeyField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyField {
    /// Field read from the source dataset
    pub source: String,

    /// Field filtered on in this view; defaults to `source`
    #[serde(default)]
    pub target: Option<String>,
}

impl KeyField {
    pub fn target(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

/// Join kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Only rows whose keys appear on both sides
    #[default]
    Inner,

    /// Every left row, with right-only fields set to null when unmatched
    #[serde(alias = "left", alias = "left_outer")]
    Outer,
}

/// Join two earlier datasets into a new one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinStep {
    pub left: String,
    pub right: String,

    /// Key fields on the left side
    pub on: Vec<String>,

    /// Key fields on the right side when they are named differently
    #[serde(default)]
    pub right_on: Option<Vec<String>>,

    #[serde(default)]
    pub how: JoinKind,

    /// Alias of the joined dataset
    pub into: String,
}

impl JoinStep {
    pub fn right_keys(&self) -> &[String] {
        self.right_on.as_deref().unwrap_or(&self.on)
    }
}

/// Projection, ordering and naming of one output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDefinition {
    pub dataset: String,
    pub part: String,
    pub columns: Vec<String>,

    #[serde(default)]
    pub sort_by: Vec<String>,
}

impl ReportDefinition {
    /// Prefix used for every file this report writes
    pub fn file_prefix(&self) -> String {
        self.file_prefix
            .clone()
            .unwrap_or_else(|| format!("{}_", self.name))
    }

    /// Checks that every alias is defined before it is used
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("report name cannot be empty".to_string());
        }
        match self.steps.first() {
            None => return Err("at least one step is required".to_string()),
            Some(StepDefinition::Join(_)) => {
                return Err("the first step must be a fetch".to_string())
            }
            Some(StepDefinition::Fetch(_)) => {}
        }

        let mut defined: Vec<&str> = Vec::new();
        for step in &self.steps {
            match step {
                StepDefinition::Fetch(fetch) => validate_fetch(fetch, &defined)?,
                StepDefinition::Join(join) => validate_join(join, &defined)?,
            }
            let alias = step.alias();
            if alias.trim().is_empty() {
                return Err("step alias cannot be empty".to_string());
            }
            if defined.contains(&alias) {
                return Err(format!("alias '{alias}' is defined twice"));
            }
            defined.push(alias);
        }

        for output in &self.outputs {
            if !defined.contains(&output.dataset.as_str()) {
                return Err(format!(
                    "output '{}' reads unknown dataset '{}'",
                    output.part, output.dataset
                ));
            }
            if output.columns.is_empty() {
                return Err(format!("output '{}' must list its columns", output.part));
            }
        }
        Ok(())
    }
}

fn validate_fetch(step: &FetchStep, defined: &[&str]) -> Result<(), String> {
    if step.endpoint.trim().is_empty() {
        return Err(format!("fetch '{}' has no endpoint", step.alias));
    }
    if step.select.is_empty() {
        return Err(format!("fetch '{}' must select at least one field", step.alias));
    }
    if step.page_size == Some(0) {
        return Err(format!("fetch '{}' has page_size 0", step.alias));
    }
    if let Some(keys) = &step.keys {
        if !defined.contains(&keys.from.as_str()) {
            return Err(format!(
                "fetch '{}' takes keys from unknown dataset '{}'",
                step.alias, keys.from
            ));
        }
        if keys.fields.is_empty() {
            return Err(format!("fetch '{}' lists no key fields", step.alias));
        }
    }
    match step.lookback_days {
        Some(0) => return Err(format!("fetch '{}' has lookback_days 0", step.alias)),
        Some(_) if !step.date_window => {
            return Err(format!(
                "fetch '{}' sets lookback_days without date_window",
                step.alias
            ))
        }
        _ => {}
    }
    if step.distinct_on.iter().any(|f| f.trim().is_empty()) {
        return Err(format!("fetch '{}' has an empty distinct_on field", step.alias));
    }
    if !step.date_window && step.filters.is_empty() && step.keys.is_none() {
        return Err(format!(
            "fetch '{}' needs date_window, filters or keys",
            step.alias
        ));
    }
    Ok(())
}

fn validate_join(step: &JoinStep, defined: &[&str]) -> Result<(), String> {
    for side in [&step.left, &step.right] {
        if !defined.contains(&side.as_str()) {
            return Err(format!(
                "join '{}' reads unknown dataset '{side}'",
                step.into
            ));
        }
    }
    if step.on.is_empty() {
        return Err(format!("join '{}' has no key fields", step.into));
    }
    if step.right_keys().len() != step.on.len() {
        return Err(format!(
            "join '{}' has {} left keys but {} right keys",
            step.into,
            step.on.len(),
            step.right_keys().len()
        ));
    }
    Ok(())
}
