//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "p21-extract.toml")]
    pub output: String,

    /// Include an example report and comments for every option
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing p21-extract configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set P21_API_USERNAME and P21_API_PASSWORD");
                println!("  3. Validate configuration: p21-extract validate-config");
                println!("  4. Run reports: p21-extract run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# p21-extract Configuration File

[application]
log_level = "info"
debug = false

[api]
base_url = "https://p21.example.com"
username = "${P21_API_USERNAME}"
password = "${P21_API_PASSWORD}"

[run]
output_dir = "output"
max_concurrent_reports = 5

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# p21-extract Configuration File
#
# Values of the form ${NAME} are read from the environment (or a .env file).
# Any single key can also be overridden with P21_<SECTION>_<KEY>, for example
# P21_RUN_START_DATE=2024-01-01.

[application]
# trace | debug | info | warn | error
log_level = "info"
# Export every intermediate dataset and stop at the first failed report
debug = false

[api]
# Prophet 21 server; tokens come from <base_url>/api/security/token
base_url = "https://p21.example.com"
# Views are served from <base_url>/<service_path>/<view>
service_path = "odataservice/odata/view"
username = "${P21_API_USERNAME}"
password = "${P21_API_PASSWORD}"
# get | post
method = "get"
timeout_seconds = 60
auth_timeout_seconds = 30
pool_max_idle_per_host = 10
# requests_per_second = 5.0

[api.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

[api.chunking]
# URLs longer than this (after encoding) are split on their OR filter
max_url_length = 2048
chunk_size = 50
min_conditions = 3

[run]
# Defaults to the first day of the current month
# start_date = "2024-01-01"
# Defaults to the last day of the start month
# end_date = "2024-01-31"
output_dir = "output"
# Empty runs every report
report_groups = []
max_concurrent_reports = 5
fail_fast = false

[logging]
local_enabled = false
local_path = "logs"
# daily | hourly | never
local_rotation = "daily"

# Reports are pipelines of `fetch` and `join` steps. A fetch with `keys`
# filters its view on the distinct values of fields from an earlier dataset;
# a required fetch that returns nothing ends the report without output.
# Steps with `export_part` are also written when debug is on.

# Invoices for two ship-to locations with their lines and item suppliers
[[reports]]
name = "jarp"
group = "monthly"
file_prefix = "jarp_"

[[reports.steps]]
kind = "fetch"
alias = "invoice"
endpoint = "p21_view_invoice_hdr"
select = ["bill2_name", "freight", "invoice_date", "invoice_no", "other_charge_amount", "period", "po_no", "ship2_address1", "tax_amount", "total_amount", "year_for_period", "ship_to_id", "salesrep_id"]
filters = ["(ship_to_id eq 12755 or ship_to_id eq 15097)", "not startswith(po_no, 'P')"]
order_by = ["invoice_date asc"]
date_window = true
date_field = "invoice_date"
page_size = 500
export_part = "invoice"

[[reports.steps]]
kind = "fetch"
alias = "invoice_line"
endpoint = "p21_view_invoice_line"
select = ["item_id", "item_desc", "qty_requested", "qty_shipped", "unit_price", "extended_price", "customer_part_number", "invoice_no", "line_no"]
keys = { from = "invoice", fields = [{ source = "invoice_no" }] }
page_size = 500
export_part = "invoice_line"

[[reports.steps]]
kind = "fetch"
alias = "sales_history"
endpoint = "p21_sales_history_view"
select = ["item_id", "item_desc", "unit_price", "customer_id", "inv_mast_uid", "supplier_id", "invoice_no", "line_no", "ship_to_id"]
keys = { from = "invoice", fields = [{ source = "invoice_no" }] }
page_size = 500
export_part = "sales_history"

[[reports.steps]]
kind = "fetch"
alias = "supplier"
endpoint = "p21_view_inventory_supplier"
select = ["inv_mast_uid", "supplier_id", "item_id"]
keys = { from = "sales_history", fields = [{ source = "supplier_id" }] }
page_size = 500
optional = true
export_part = "supplier"

[[reports.steps]]
kind = "join"
left = "sales_history"
right = "supplier"
on = ["inv_mast_uid", "supplier_id", "item_id"]
into = "sales_supplier"

[[reports.steps]]
kind = "join"
left = "invoice"
right = "sales_supplier"
on = ["invoice_no"]
into = "invoice_sales"

[[reports.steps]]
kind = "join"
left = "invoice_sales"
right = "invoice_line"
on = ["invoice_no", "line_no"]
into = "final"

[[reports.outputs]]
dataset = "final"
part = "report"
columns = ["bill2_name", "ship2_address1", "invoice_date", "invoice_no", "item_id", "item_desc", "qty_requested", "qty_shipped", "unit_price", "extended_price", "customer_part_number", "po_no"]
sort_by = ["invoice_date"]

# Stock value with each item's latest sale and purchase over the past year
[[reports]]
name = "inventory_value"
group = "inventory"
file_prefix = "inventory_value_"

[[reports.steps]]
kind = "fetch"
alias = "sales"
endpoint = "p21_sales_history_view"
select = ["item_id", "invoice_date"]
order_by = ["item_id asc", "invoice_date desc"]
date_window = true
date_field = "invoice_date"
lookback_days = 365
distinct_on = ["item_id"]
optional = true

[[reports.steps]]
kind = "fetch"
alias = "po_line"
endpoint = "p21_view_po_line"
select = ["item_id", "date_created", "received_date"]
order_by = ["item_id asc", "date_created desc"]
date_window = true
date_field = "date_created"
lookback_days = 365
distinct_on = ["item_id"]
optional = true

[[reports.steps]]
kind = "fetch"
alias = "inventory_value"
endpoint = "p21_view_inventory_value_report"
select = ["item_id", "cost", "qty_on_hand", "fifo_layer_qty", "fifo_layer_value"]
filters = ["fifo_layer_qty gt 0"]

[[reports.steps]]
kind = "join"
left = "inventory_value"
right = "sales"
on = ["item_id"]
how = "outer"
into = "with_sales"

[[reports.steps]]
kind = "join"
left = "with_sales"
right = "po_line"
on = ["item_id"]
how = "outer"
into = "merged"

[[reports.outputs]]
dataset = "sales"
part = "sales"
columns = ["item_id", "invoice_date"]

[[reports.outputs]]
dataset = "po_line"
part = "po_line"
columns = ["item_id", "date_created", "received_date"]

[[reports.outputs]]
dataset = "inventory_value"
part = "inventory_value"
columns = ["item_id", "cost", "qty_on_hand", "fifo_layer_qty", "fifo_layer_value"]

[[reports.outputs]]
dataset = "merged"
part = "merged_output"
columns = ["item_id", "invoice_date", "date_created", "received_date", "cost", "qty_on_hand", "fifo_layer_qty", "fifo_layer_value"]

# Open purchase orders with supplier names and remaining lines
[[reports]]
name = "open_po"
group = "inventory"
file_prefix = "open_po_"

[[reports.steps]]
kind = "fetch"
alias = "po"
endpoint = "p21_view_po_hdr"
select = ["supplier_id", "po_no", "order_date", "expected_date"]
filters = ["complete eq 'N'"]
order_by = ["supplier_id asc", "order_date asc"]

[[reports.steps]]
kind = "fetch"
alias = "po_line"
endpoint = "p21_view_po_line"
select = ["po_no", "line_no", "item_id", "item_description", "qty_ordered", "qty_received"]
filters = ["complete eq 'N'"]
order_by = ["po_no asc", "line_no asc"]
keys = { from = "po", fields = [{ source = "po_no" }] }

[[reports.steps]]
kind = "fetch"
alias = "supplier"
endpoint = "p21_view_supplier"
select = ["supplier_id", "supplier_name"]
keys = { from = "po", fields = [{ source = "supplier_id" }] }

[[reports.steps]]
kind = "join"
left = "po"
right = "supplier"
on = ["supplier_id"]
into = "po_supplier"

[[reports.steps]]
kind = "join"
left = "po_supplier"
right = "po_line"
on = ["po_no"]
into = "report"

[[reports.outputs]]
dataset = "report"
part = "report"
columns = ["supplier_id", "supplier_name", "po_no", "order_date", "expected_date", "item_id", "item_description", "qty_ordered", "qty_received"]

# Monthly sales of one supplier's items with customer tax exemptions
[[reports]]
name = "kennametal_pos"
group = "monthly"
file_prefix = "kennametal_pos_"

[[reports.steps]]
kind = "fetch"
alias = "sales"
endpoint = "p21_sales_history_view"
select = ["bill2_country", "cogs_amount", "customer_id", "inv_mast_uid", "invoice_date", "invoice_no", "item_desc", "period", "qty_shipped", "ship2_address1", "ship2_city", "ship2_name", "ship2_postal_code", "ship2_state", "supplier_id", "unit_price", "year_for_period", "salesrep_id"]
filters = ["supplier_id eq 11777"]
date_window = true
date_field = "invoice_date"
export_part = "sales"

[[reports.steps]]
kind = "fetch"
alias = "customer"
endpoint = "p21_view_customer"
select = ["customer_id", "customer_id_string", "federal_exemption_number", "other_exemption_number", "state_excise_tax_exemption_no"]
filters = ["customer_id ne 1"]
order_by = ["customer_id asc"]
keys = { from = "sales", fields = [{ source = "customer_id" }] }
export_part = "customer"

[[reports.steps]]
kind = "fetch"
alias = "supplier"
endpoint = "p21_view_inventory_supplier"
select = ["cost", "inv_mast_uid", "item_id", "supplier_id"]
filters = ["supplier_id eq 11777"]
export_part = "supplier"

[[reports.steps]]
kind = "join"
left = "sales"
right = "customer"
on = ["customer_id"]
into = "sales_customer"

[[reports.steps]]
kind = "join"
left = "sales_customer"
right = "supplier"
on = ["inv_mast_uid", "supplier_id"]
into = "final"

[[reports.outputs]]
dataset = "final"
part = "report"
columns = ["bill2_country", "cogs_amount", "invoice_date", "invoice_no", "item_desc", "qty_shipped", "ship2_address1", "ship2_city", "ship2_name", "ship2_postal_code", "ship2_state", "unit_price", "federal_exemption_number", "other_exemption_number", "state_excise_tax_exemption_no", "cost", "item_id", "salesrep_id"]
sort_by = ["invoice_date"]
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::core::pipeline::{JoinKind, StepDefinition};

    fn with_credentials(template: &str) -> String {
        template
            .replace("${P21_API_USERNAME}", "user")
            .replace("${P21_API_PASSWORD}", "secret")
    }

    #[test]
    fn test_generate_minimal_config() {
        let config = InitArgs::generate_minimal_config();
        assert!(config.contains("[application]"));
        assert!(config.contains("[api]"));
        assert!(config.contains("[run]"));

        let parsed = parse_config(&with_credentials(&config)).unwrap();
        assert!(parsed.reports.is_empty());
    }

    #[test]
    fn test_generate_config_with_examples_is_valid() {
        let config = InitArgs::generate_config_with_examples();
        assert!(config.contains("# p21-extract Configuration File"));

        let parsed = parse_config(&with_credentials(&config)).unwrap();
        let names: Vec<&str> = parsed.reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["jarp", "inventory_value", "open_po", "kennametal_pos"]);
        assert_eq!(parsed.reports[0].steps.len(), 7);
        assert_eq!(parsed.api.chunking.max_url_length, 2048);
    }

    #[test]
    fn test_sample_jarp_joins_on_item_supplier_key() {
        let config = InitArgs::generate_config_with_examples();
        let parsed = parse_config(&with_credentials(&config)).unwrap();

        let join = parsed.reports[0]
            .steps
            .iter()
            .find_map(|step| match step {
                StepDefinition::Join(join) if join.into == "sales_supplier" => Some(join),
                _ => None,
            })
            .unwrap();
        assert_eq!(join.on, vec!["inv_mast_uid", "supplier_id", "item_id"]);
        assert_eq!(join.how, JoinKind::Inner);
    }

    #[test]
    fn test_sample_inventory_value_keeps_latest_per_item() {
        let config = InitArgs::generate_config_with_examples();
        let parsed = parse_config(&with_credentials(&config)).unwrap();

        let report = &parsed.reports[1];
        let deduplicated: Vec<&str> = report
            .steps
            .iter()
            .filter_map(|step| match step {
                StepDefinition::Fetch(fetch) if fetch.distinct_on == ["item_id"] => {
                    assert_eq!(fetch.lookback_days, Some(365));
                    Some(fetch.alias.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(deduplicated, vec!["sales", "po_line"]);
        assert_eq!(report.outputs.len(), 4);
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p21-extract.toml");
        fs::write(&path, "existing").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().into_owned(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing");

        let args = InitArgs { force: true, ..args };
        assert_eq!(args.execute().await.unwrap(), 0);
        assert!(fs::read_to_string(&path).unwrap().contains("[api]"));
    }
}
