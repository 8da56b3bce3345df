//! `workbench operators` subcommand.

use operator::BaseOptions;

use crate::registry::standard_registry;

/// Print one line per operator with its versions.
pub fn run() {
    let registry = standard_registry(BaseOptions::default());
    for line in registry.available() {
        println!("{line}");
    }
}
