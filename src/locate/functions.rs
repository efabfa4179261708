use super::{Discovery, FunctionEntry, HitMask, LocateError, Locator};
use crate::go::types::FuncObject;
use crate::spec::NameSpec;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;

impl Locator {
    pub(super) fn find_functions(&self, discovery: &Discovery<'_>, specs: &[NameSpec]) -> Result<(), LocateError> {
        specs
            .par_iter()
            .try_for_each(|spec| self.find_functions_in_package(discovery, spec))
    }

    fn find_functions_in_package(&self, discovery: &Discovery<'_>, spec: &NameSpec) -> Result<(), LocateError> {
        discovery.check()?;
        let pkg = discovery
            .universe
            .package(&spec.path)
            .ok_or_else(|| LocateError::Lookup {
                kind: "functions",
                package: spec.path.clone(),
            })?;

        let mut found = 0;
        for func in &pkg.funcs {
            if !func.exported() || !spec.matches(&func.name) {
                continue;
            }
            if func.is_method() && !self.options.include_methods {
                continue;
            }
            self.add_function(func, Vec::new());
            found += 1;
        }
        if found == 0 && !self.options.ignore_missing {
            return Err(LocateError::NoMatch {
                kind: "functions",
                package: spec.path.clone(),
                pattern: spec.pattern.to_string(),
            });
        }
        Ok(())
    }

    /// Records a function. Adding one that is already present replaces its
    /// declaration and merges the interfaces it implements.
    pub(super) fn add_function(&self, func: &Arc<FuncObject>, implements: Vec<String>) {
        let Some(position) = self.loader.position(&func.filename, func.name_span.start) else {
            return;
        };
        if implements.is_empty() {
            debug!(function = %func.full_name, %position, "function");
        } else {
            debug!(method = %func.full_name, ?implements, %position, "implementation");
        }
        let mut index = self.lock();
        index.mark(&func.filename, HitMask::FUNCTION);
        match index.functions.entry(func.full_name.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get_mut();
                existing.function = Arc::clone(func);
                existing.decl = func.decl.clone();
                existing.package = func.package.clone();
                existing.position = position;
                existing.implements.extend(implements);
                existing.implements.sort();
                existing.implements.dedup();
            }
            Entry::Vacant(vacant) => {
                let mut implements = implements;
                implements.sort();
                implements.dedup();
                vacant.insert(FunctionEntry {
                    name: func.full_name.clone(),
                    function: Arc::clone(func),
                    decl: func.decl.clone(),
                    package: func.package.clone(),
                    position,
                    implements,
                });
            }
        }
    }
}
