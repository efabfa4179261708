use super::{Discovery, LocateError, Locator};
use crate::go::types::MethodSet;
use rayon::prelude::*;
use tracing::debug;

impl Locator {
    /// Records every exported concrete method in `packages` whose receiver
    /// type implements one of the located interfaces.
    pub(super) fn find_implementations(&self, discovery: &Discovery<'_>, packages: &[String]) -> Result<(), LocateError> {
        let interfaces: Vec<(String, MethodSet)> = self
            .lock()
            .interfaces
            .values()
            .filter_map(|entry| match &entry.method_set {
                Some(set) => Some((entry.name.clone(), set.clone())),
                None => {
                    debug!(interface = %entry.name, "no method set, skipped for implementations");
                    None
                }
            })
            .collect();
        packages
            .par_iter()
            .try_for_each(|path| self.find_implementations_in_package(discovery, path, &interfaces))
    }

    fn find_implementations_in_package(
        &self,
        discovery: &Discovery<'_>,
        path: &str,
        interfaces: &[(String, MethodSet)],
    ) -> Result<(), LocateError> {
        discovery.check()?;
        let universe = &discovery.universe;
        let pkg = universe.package(path).ok_or_else(|| LocateError::Lookup {
            kind: "interface implementations",
            package: path.to_string(),
        })?;
        for method in pkg.methods.values().flatten() {
            if !method.exported() || method.decl.is_none() || method.is_abstract() {
                continue;
            }
            let Some(receiver) = &method.receiver else {
                continue;
            };
            let implemented: Vec<String> = interfaces
                .iter()
                .filter(|(_, set)| universe.implements(&pkg.path, &receiver.type_name, receiver.pointer, set))
                .map(|(name, _)| name.clone())
                .collect();
            if !implemented.is_empty() {
                self.add_function(method, implemented);
            }
        }
        Ok(())
    }
}
