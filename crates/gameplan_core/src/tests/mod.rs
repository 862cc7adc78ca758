//! Cross-module scenarios for the projection engine
//!
//! Tests are organized by topic:
//! - `alignment` - Collection totals over the union of member dates, sign convention
//! - `compounding` - Asset balances against closed-form compounding
//! - `portfolio` - Salary, 401k, expenses and cash savings working together
//! - `growth` - Expense presets and income-model driven salaries

mod compounding;
mod growth;
