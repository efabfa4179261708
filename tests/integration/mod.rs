//! Integration tests against Go modules written to temporary directories,
//! resolved with `ModuleLayout` and formatted with `Passthrough`.

mod annotate;
mod edit;
mod fixture;
mod locate;
