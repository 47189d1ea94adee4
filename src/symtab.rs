//! Scoped symbol table used by the interpreter.
//!
//! Bindings live in one fixed-capacity slot array and are tagged with the
//! scope depth that created them. Entering a scope only bumps the depth;
//! leaving it clears every slot tagged with that depth. Two sibling blocks
//! therefore reuse the same depth number, which is safe because the first one
//! is fully cleared before the second starts. The table can say how deep a
//! binding is, never which lexical block it came from.
//!
//! Depth has no upper bound.

use crate::error::SymbolError;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default)]
struct Slot {
  name: String,
  value: i64,
  occupied: bool,
  initialized: bool,
  scope: usize,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
  slots: Vec<Slot>,
  current_scope: usize,
}

impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  /// A table that can hold at most `capacity` live bindings across all
  /// scopes. It never grows.
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      slots: vec![Slot::default(); capacity],
      current_scope: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Number of occupied slots.
  pub fn len(&self) -> usize {
    self.slots.iter().filter(|slot| slot.occupied).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn scope_depth(&self) -> usize {
    self.current_scope
  }

  /// Drop every binding and return to depth 0.
  pub fn clear(&mut self) {
    self.slots.fill(Slot::default());
    self.current_scope = 0;
  }

  /// Bind `name` in the current scope, shadowing any outer binding. Re-declaring
  /// in the same scope overwrites the value.
  pub fn declare(&mut self, name: &str, value: i64) -> Result<(), SymbolError> {
    let idx = match self.find_in_scope(name, self.current_scope) {
      Some(idx) => idx,
      None => self.allocate(name)?,
    };
    self.store(idx, value);
    Ok(())
  }

  /// Update the nearest enclosing binding of `name`, or create one in the
  /// current scope when none exists.
  pub fn set(&mut self, name: &str, value: i64) -> Result<(), SymbolError> {
    let idx = match self.resolve(name) {
      Some(idx) => idx,
      None => self.allocate(name)?,
    };
    self.store(idx, value);
    Ok(())
  }

  /// Look up the nearest enclosing initialized binding of `name`.
  pub fn get(&self, name: &str) -> Option<i64> {
    let slot = &self.slots[self.resolve(name)?];
    slot.initialized.then_some(slot.value)
  }

  pub fn push_scope(&mut self) {
    self.current_scope += 1;
  }

  /// Clear every binding tagged with the current depth, then step out. Popping
  /// at depth 0 clears the outermost bindings and stays at 0.
  pub fn pop_scope(&mut self) {
    let scope = self.current_scope;
    for slot in self
      .slots
      .iter_mut()
      .filter(|slot| slot.occupied && slot.scope == scope)
    {
      slot.occupied = false;
      slot.initialized = false;
    }
    self.current_scope = self.current_scope.saturating_sub(1);
  }

  fn find_in_scope(&self, name: &str, scope: usize) -> Option<usize> {
    self
      .slots
      .iter()
      .position(|slot| slot.occupied && slot.scope == scope && slot.name == name)
  }

  /// Search from the current depth down to 0.
  fn resolve(&self, name: &str) -> Option<usize> {
    (0..=self.current_scope)
      .rev()
      .find_map(|scope| self.find_in_scope(name, scope))
  }

  fn allocate(&mut self, name: &str) -> Result<usize, SymbolError> {
    let capacity = self.capacity();
    let Some(idx) = self.slots.iter().position(|slot| !slot.occupied) else {
      return Err(SymbolError::TableExhausted {
        name: name.to_string(),
        capacity,
      });
    };
    let slot = &mut self.slots[idx];
    slot.name.clear();
    slot.name.push_str(name);
    slot.occupied = true;
    slot.initialized = false;
    slot.scope = self.current_scope;
    Ok(idx)
  }

  fn store(&mut self, idx: usize, value: i64) {
    let slot = &mut self.slots[idx];
    slot.value = value;
    slot.initialized = true;
  }
}
