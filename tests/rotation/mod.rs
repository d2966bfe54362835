//! BDD coverage for `snapwarden` runs against the in-memory fleet.

mod bdd_steps;
mod scenarios;
mod test_helpers;
