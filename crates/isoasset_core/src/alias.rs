//! Request alias rewriting, consulted before default resolution.

use crate::error::AssetResult;
use crate::host::ResolveHook;
use crate::runtime::RuntimeContext;
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Rewrites `key` or `key/rest` requests to `<root>/<target>[/rest]`.
///
/// Longer keys are tried first so `ui/icons` wins over `ui`.
pub struct AliasInterceptor {
    rules: Vec<(String, String)>,
    runtime: Rc<RuntimeContext>,
}

impl AliasInterceptor {
    pub fn new(aliases: &BTreeMap<String, String>, runtime: Rc<RuntimeContext>) -> Self {
        let mut rules: Vec<(String, String)> = aliases
            .iter()
            .map(|(key, target)| (key.trim_end_matches('/').to_string(), target.clone()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { rules, runtime }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies the first matching rule relative to `root`.
    pub fn rewrite_with_root(&self, request: &str, root: &Path) -> Option<PathBuf> {
        let (target, rest) = self.find_rule(request)?;
        let base = root.join(target);
        Some(match rest {
            Some(rest) => base.join(rest),
            None => base,
        })
    }

    /// Returns the matched target and the remainder after `key/`, if any.
    fn find_rule<'a>(&'a self, request: &'a str) -> Option<(&'a str, Option<&'a str>)> {
        self.rules.iter().find_map(|(key, target)| {
            let rest = request.strip_prefix(key.as_str())?;
            if rest.is_empty() {
                return Some((target.as_str(), None));
            }
            Some((target.as_str(), Some(rest.strip_prefix('/')?)))
        })
    }
}

impl ResolveHook for AliasInterceptor {
    fn rewrite(&self, request: &str) -> AssetResult<Option<PathBuf>> {
        if self.find_rule(request).is_none() {
            return Ok(None);
        }
        // Only aliased requests depend on the project root.
        let root = self.runtime.project_root()?;
        let rewritten = self.rewrite_with_root(request, root);
        if let Some(path) = &rewritten {
            debug!(
                "event=alias module=alias status=rewritten request={request} path={}",
                path.display()
            );
        }
        Ok(rewritten)
    }
}
