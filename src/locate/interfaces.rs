use super::{Discovery, HitMask, InterfaceEntry, LocateError, Locator};
use crate::go::syntax::is_exported;
use crate::spec::NameSpec;
use rayon::prelude::*;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

impl Locator {
    pub(super) fn find_interfaces(&self, discovery: &Discovery<'_>, specs: &[NameSpec]) -> Result<(), LocateError> {
        specs
            .par_iter()
            .try_for_each(|spec| self.find_interfaces_in_package(discovery, spec))
    }

    fn find_interfaces_in_package(&self, discovery: &Discovery<'_>, spec: &NameSpec) -> Result<(), LocateError> {
        discovery.check()?;
        let universe = &discovery.universe;
        let pkg = universe.package(&spec.path).ok_or_else(|| LocateError::Lookup {
            kind: "interfaces",
            package: spec.path.clone(),
        })?;

        let matched: Vec<String> = pkg
            .types
            .keys()
            .filter(|name| is_exported(name) && spec.matches(name))
            .filter(|name| universe.interface_of(&pkg.path, name).is_some())
            .cloned()
            .collect();
        if matched.is_empty() {
            if self.options.ignore_missing {
                return Ok(());
            }
            return Err(LocateError::NoMatch {
                kind: "interfaces",
                package: spec.path.clone(),
                pattern: spec.pattern.to_string(),
            });
        }

        // Interfaces embedded from the same package are located too,
        // whatever their name.
        let mut queue: VecDeque<String> = matched.into();
        let mut seen = BTreeSet::new();
        while let Some(name) = queue.pop_front() {
            if seen.insert(name.clone()) {
                queue.extend(universe.local_embeds(&pkg.path, &name));
            }
        }
        for name in seen {
            self.add_interface(discovery, &pkg.path, &name);
        }
        Ok(())
    }

    fn add_interface(&self, discovery: &Discovery<'_>, package: &str, name: &str) {
        let universe = &discovery.universe;
        let Some((_, ifc)) = universe.interface_of(package, name) else {
            return;
        };
        let Some(def) = universe.package(package).and_then(|p| p.types.get(name)) else {
            return;
        };
        let Some(position) = self.loader.position(&def.filename, def.spec.name.span.start) else {
            return;
        };
        let entry = InterfaceEntry {
            name: format!("{package}.{name}"),
            package: package.to_string(),
            local_name: name.to_string(),
            interface: ifc.clone(),
            method_set: universe.interface_method_set(package, name),
            decl: def.spec.clone(),
            position,
        };
        debug!(interface = %entry.name, position = %entry.position, "interface");
        let mut index = self.lock();
        index.mark(entry.position.filename(), HitMask::INTERFACE);
        index.interfaces.insert(entry.name.clone(), entry);
    }
}
