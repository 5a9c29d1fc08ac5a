//! Pluggable recipe intake for the control node.
//!
//! The recipe-entry application (out of scope here) writes orders as
//! `Name:percent` lines. The control node polls the source until a
//! non-empty recipe appears, consumes it for one pour cycle, and clears the
//! source so the same order is never poured twice. Malformed or unrecognized
//! lines are silently skipped, matching the original intake behavior.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pourbot_types::{DispenserError, Ingredient, Recipe};
use tracing::{debug, info};

/// A source of drink orders.
pub trait RecipeSource: Send {
    /// Check for a pending order.
    ///
    /// Returns `Ok(None)` when no (non-empty) recipe is available yet; the
    /// control session keeps polling.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Recipe`] on I/O failure.
    fn poll(&mut self) -> Result<Option<Recipe>, DispenserError>;

    /// Clear the consumed order so the next poll starts fresh.
    ///
    /// # Errors
    ///
    /// Returns [`DispenserError::Recipe`] on I/O failure.
    fn clear(&mut self) -> Result<(), DispenserError>;
}

/// Parse order text into a [`Recipe`].
///
/// Each line is `Name:percent`; percentages become fractions of 1.0. Lines
/// with unknown ingredient names, missing separators, or non-numeric
/// percentages are skipped without failing the order.
pub fn parse_recipe(text: &str) -> Recipe {
    let mut recipe = Recipe::new();
    for line in text.lines() {
        let Some((name, percent)) = line.split_once(':') else {
            debug!(line, "recipe line has no separator; skipped");
            continue;
        };
        let Some(ingredient) = Ingredient::parse(name) else {
            debug!(line, "unrecognized ingredient; skipped");
            continue;
        };
        let Ok(percent) = percent.trim().parse::<f32>() else {
            debug!(line, "non-numeric percentage; skipped");
            continue;
        };
        recipe.set(ingredient, percent / 100.0);
    }
    recipe
}

/// File-backed recipe source: the order file the recipe-entry application
/// writes.
pub struct FileRecipeSource {
    path: PathBuf,
}

impl FileRecipeSource {
    /// Read orders from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecipeSource for FileRecipeSource {
    fn poll(&mut self) -> Result<Option<Recipe>, DispenserError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            // No file yet means no order yet, not a fault.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DispenserError::Recipe(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let recipe = parse_recipe(&text);
        if recipe.is_empty() {
            return Ok(None);
        }
        info!(path = %self.path.display(), ?recipe, "order received");
        Ok(Some(recipe))
    }

    fn clear(&mut self) -> Result<(), DispenserError> {
        std::fs::write(&self.path, "").map_err(|e| {
            DispenserError::Recipe(format!("failed to clear {}: {e}", self.path.display()))
        })
    }
}

/// In-memory recipe source for tests. Clones share the same slot, so a test
/// can keep a handle while the source moves into a session.
#[derive(Clone, Default)]
pub struct InMemoryRecipeSource(Arc<Mutex<Option<Recipe>>>);

impl InMemoryRecipeSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an order into the slot.
    pub fn submit(&self, recipe: Recipe) {
        *self.0.lock().expect("recipe slot poisoned") = Some(recipe);
    }

    /// `true` when the slot holds no order (e.g. after a cycle cleared it).
    pub fn is_cleared(&self) -> bool {
        self.0.lock().expect("recipe slot poisoned").is_none()
    }
}

impl RecipeSource for InMemoryRecipeSource {
    fn poll(&mut self) -> Result<Option<Recipe>, DispenserError> {
        let slot = self.0.lock().expect("recipe slot poisoned");
        Ok(slot.clone().filter(|r| !r.is_empty()))
    }

    fn clear(&mut self) -> Result<(), DispenserError> {
        *self.0.lock().expect("recipe slot poisoned") = None;
        Ok(())
    }
}
