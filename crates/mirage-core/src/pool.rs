//! Process-wide string pool for target directory paths.
//!
//! Big overlays put thousands of files under a handful of subfolders; every
//! `RedirectTarget` in one subfolder shares a single interned directory
//! string instead of carrying its own copy.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

static POOL: Lazy<Mutex<HashMap<Box<str>, Arc<str>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Intern `value`, returning the shared instance. Only called at
/// configuration time; the query path never touches the pool.
pub fn intern(value: &str) -> Arc<str> {
    let mut pool = match POOL.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(existing) = pool.get(value) {
        return Arc::clone(existing);
    }
    let shared: Arc<str> = Arc::from(value);
    pool.insert(Box::from(value), Arc::clone(&shared));
    shared
}

/// Number of distinct strings currently pooled.
pub fn len() -> usize {
    match POOL.lock() {
        Ok(guard) => guard.len(),
        Err(poisoned) => poisoned.into_inner().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interned_values_share_storage() {
        let a = intern("C:\\MOD\\TEXTURES-POOL-TEST");
        let b = intern("C:\\MOD\\TEXTURES-POOL-TEST");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_values_differ() {
        let a = intern("C:\\MOD\\POOL-A");
        let b = intern("C:\\MOD\\POOL-B");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(&*a, "C:\\MOD\\POOL-A");
    }
}
