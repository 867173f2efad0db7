//! Mutation guard: preview-before-apply enforcement for in-place edits.
//!
//! Every in-place substitution must be preceded by a preview with exactly the
//! same `(target, search, replace)` triple. A preview records the triple's
//! [`OperationKey`]; an apply consumes it. Changing any character of any of
//! the three inputs yields a different key and therefore needs a new preview.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use regex::Regex;
use sha2::{Digest, Sha256};
use similar::TextDiff;
use tracing::{debug, info};

use crate::error::{FerruleError, Result};

/// Deterministic fingerprint of a substitution request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey(String);

impl OperationKey {
    /// Hex-encoded SHA-256 digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful preview.
#[derive(Debug, Clone)]
pub struct Preview {
    pub key: OperationKey,
    /// Unified diff of original against substituted content
    pub diff: String,
    /// Number of matches the search pattern produced
    pub replacements: usize,
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct Applied {
    pub key: OperationKey,
    pub replacements: usize,
}

/// Content-addressed cache of previewed substitutions.
///
/// One instance per conversation owner. Entries are created by
/// [`MutationGuard::preview`] and removed by a successful
/// [`MutationGuard::apply`]; they never expire otherwise.
#[derive(Debug, Default)]
pub struct MutationGuard {
    approved: HashMap<OperationKey, bool>,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the key for a substitution request.
    ///
    /// Each field is length-prefixed before hashing so that shifting
    /// characters between adjacent fields changes the key.
    ///
    /// # Example
    /// ```
    /// use ferrule::safety::MutationGuard;
    /// use std::path::Path;
    ///
    /// let a = MutationGuard::operation_key(Path::new("main.go"), "foo", "bar");
    /// let b = MutationGuard::operation_key(Path::new("main.go"), "foo", "bar ");
    /// assert_ne!(a, b);
    /// assert_eq!(a.as_str().len(), 64);
    /// ```
    pub fn operation_key(target: &Path, search: &str, replace: &str) -> OperationKey {
        let target = target.to_string_lossy();
        let mut hasher = Sha256::new();
        for field in [target.as_ref(), search, replace] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        OperationKey(hex::encode(hasher.finalize()))
    }

    /// Whether a preview for this key is waiting to be applied.
    pub fn is_approved(&self, key: &OperationKey) -> bool {
        self.approved.get(key).copied().unwrap_or(false)
    }

    /// Number of previews waiting to be applied.
    pub fn pending(&self) -> usize {
        self.approved.values().filter(|v| **v).count()
    }

    /// Simulate the substitution and record approval for the exact triple.
    ///
    /// The target file is read but never written.
    pub async fn preview(&mut self, target: &Path, search: &str, replace: &str) -> Result<Preview> {
        let key = Self::operation_key(target, search, replace);
        let original = read_target(target).await?;
        let (updated, replacements) = substitute(&original, search, replace)?;

        let target_display = target.display().to_string();
        let diff = TextDiff::from_lines(original.as_str(), updated.as_str())
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{}", target_display), &format!("b/{}", target_display))
            .to_string();

        self.approved.insert(key.clone(), true);
        debug!(target = %target_display, key = %key, replacements, "Substitution previewed");

        Ok(Preview {
            key,
            diff,
            replacements,
        })
    }

    /// Perform a previously previewed substitution in place.
    ///
    /// Fails with [`FerruleError::PreviewRequired`] and leaves the file
    /// untouched unless a preview with identical arguments is outstanding.
    /// On success the approval is consumed.
    pub async fn apply(&mut self, target: &Path, search: &str, replace: &str) -> Result<Applied> {
        let key = Self::operation_key(target, search, replace);
        if !self.is_approved(&key) {
            return Err(FerruleError::PreviewRequired(target.display().to_string()));
        }

        let original = read_target(target).await?;
        let (updated, replacements) = substitute(&original, search, replace)?;
        tokio::fs::write(target, updated).await?;

        self.approved.remove(&key);
        info!(target = %target.display(), key = %key, replacements, "Substitution applied");

        Ok(Applied { key, replacements })
    }
}

async fn read_target(target: &Path) -> Result<String> {
    tokio::fs::read_to_string(target).await.map_err(|e| {
        FerruleError::Tool(format!("Cannot read {}: {}", target.display(), e))
    })
}

/// Global regex replacement with `$1`-style capture references.
fn substitute(original: &str, search: &str, replace: &str) -> Result<(String, usize)> {
    let re = Regex::new(search)?;
    let replacements = re.find_iter(original).count();
    let updated = re.replace_all(original, replace).into_owned();
    Ok((updated, replacements))
}
