//! Named guard extensions, looked up at call time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::AuthError;
use crate::guard::JwtGuard;
use crate::provider::JwtSubject;

/// A callable registered under a name.
pub type Extension<P> =
    Arc<dyn Fn(&mut JwtGuard<P>, &[Value]) -> Result<Value, AuthError> + Send + Sync>;

/// Registry of [`Extension`]s.  Build once, share between guards.
///
/// ```rust
/// use jwt_guard::{Extensions, JwtSubject};
/// use serde_json::Value;
///
/// #[derive(Clone)]
/// struct User(u32);
/// impl JwtSubject for User {
///     fn jwt_identifier(&self) -> String { self.0.to_string() }
/// }
///
/// let mut extensions = Extensions::<User>::new();
/// extensions.register("is_admin", |guard, _args| {
///     Ok(Value::Bool(guard.id().as_deref() == Some("1")))
/// });
/// assert!(extensions.has("is_admin"));
/// ```
pub struct Extensions<P: JwtSubject + Clone + 'static> {
    entries: HashMap<String, Extension<P>>,
}

impl<P: JwtSubject + Clone + 'static> Default for Extensions<P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<P: JwtSubject + Clone + 'static> std::fmt::Debug for Extensions<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

impl<P: JwtSubject + Clone + 'static> Extensions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut JwtGuard<P>, &[Value]) -> Result<Value, AuthError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(f));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Extension<P>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
