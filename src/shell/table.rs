// Copyright 2018-2025 the Deno authors. MIT license.

//! Open-addressed, linearly probed table keyed by name.
//!
//! The interpreter keeps three of these (functions, variables and the
//! command path cache). They share hashing, probing and growth and only
//! differ in what they store per slot.

/// Starting number of slots. Must be a power of two.
pub const INITIAL_SIZE: usize = 64;

#[derive(Debug, Clone)]
enum Slot<T> {
  Empty,
  Occupied(String, T),
  /// A removed entry that still has to be probed through.
  Tombstone,
}

#[derive(Debug, Clone)]
pub struct SymbolTable<T> {
  slots: Vec<Slot<T>>,
  used: usize,
  tombstones: usize,
}

impl<T> Default for SymbolTable<T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Mixes four bytes at a time and masks the result to `size - 1`.
pub fn hash(name: &str, size: usize) -> usize {
  debug_assert!(size.is_power_of_two());
  let mut bytes = name.bytes().map(i32::from);
  let mut n: i32 = 0;
  loop {
    let Some(c) = bytes.next() else { break };
    n = n.wrapping_add((c << 17) ^ (c << 11) ^ (c << 5) ^ (c >> 1));
    let Some(c) = bytes.next() else { break };
    n ^= (c << 14) + (c << 7) + (c << 4) + c;
    let Some(c) = bytes.next() else { break };
    n ^= ((!c) << 11) | ((c << 3) ^ (c >> 1));
    let Some(c) = bytes.next() else { break };
    n = n.wrapping_sub((c << 16) | (c << 9) | (c << 2) | (c & 3));
  }
  if n < 0 {
    n = !n;
  }
  (n as usize) & (size - 1)
}

impl<T> SymbolTable<T> {
  pub fn new() -> Self {
    Self::with_size(INITIAL_SIZE)
  }

  pub fn with_size(size: usize) -> Self {
    assert!(
      size >= 2 && size.is_power_of_two(),
      "table size must be a power of two of at least 2"
    );
    Self {
      slots: (0..size).map(|_| Slot::Empty).collect(),
      used: 0,
      tombstones: 0,
    }
  }

  pub fn size(&self) -> usize {
    self.slots.len()
  }

  /// Number of live entries.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn tombstones(&self) -> usize {
    self.tombstones
  }

  pub fn is_empty(&self) -> bool {
    self.used == 0
  }

  fn next_index(&self, index: usize) -> usize {
    (index + 1) & (self.size() - 1)
  }

  fn prev_index(&self, index: usize) -> usize {
    index.wrapping_sub(1) & (self.size() - 1)
  }

  /// Probes for `name`, returning the matching slot or the slot where it
  /// would be inserted: the first tombstone on the chain, otherwise the
  /// empty slot that ends it.
  fn find(&self, name: &str) -> Result<usize, usize> {
    let mut index = hash(name, self.size());
    let mut reusable = None;
    loop {
      match &self.slots[index] {
        Slot::Empty => return Err(reusable.unwrap_or(index)),
        Slot::Occupied(slot_name, _) if slot_name == name => return Ok(index),
        Slot::Occupied(..) => {}
        Slot::Tombstone => {
          if reusable.is_none() {
            reusable = Some(index);
          }
        }
      }
      index = self.next_index(index);
    }
  }

  pub fn contains(&self, name: &str) -> bool {
    self.find(name).is_ok()
  }

  pub fn get(&self, name: &str) -> Option<&T> {
    match self.find(name) {
      Ok(index) => match &self.slots[index] {
        Slot::Occupied(_, value) => Some(value),
        _ => None,
      },
      Err(_) => None,
    }
  }

  pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
    match self.find(name) {
      Ok(index) => match &mut self.slots[index] {
        Slot::Occupied(_, value) => Some(value),
        _ => None,
      },
      Err(_) => None,
    }
  }

  /// Returns the entry for `name`, creating it with `create` when absent.
  /// The boolean is true when the entry was created.
  pub fn get_or_insert_with(
    &mut self,
    name: &str,
    create: impl FnOnce() -> T,
  ) -> (&mut T, bool) {
    let (index, created) = match self.find(name) {
      Ok(index) => (index, false),
      Err(_) => {
        self.grow_if_needed();
        let index = match self.find(name) {
          Ok(index) | Err(index) => index,
        };
        if matches!(self.slots[index], Slot::Tombstone) {
          self.tombstones -= 1;
        }
        self.slots[index] = Slot::Occupied(name.to_string(), create());
        self.used += 1;
        (index, true)
      }
    };
    match &mut self.slots[index] {
      Slot::Occupied(_, value) => (value, created),
      _ => unreachable!("slot was just filled"),
    }
  }

  /// Inserts or replaces the value stored for `name`.
  pub fn insert(&mut self, name: &str, value: T) {
    if let Some(slot) = self.get_mut(name) {
      *slot = value;
      return;
    }
    self.get_or_insert_with(name, || value);
  }

  /// Removes `name`, returning its value.
  ///
  /// The slot becomes empty when the next probe slot is empty. Otherwise it
  /// becomes a tombstone so chains running through it stay intact.
  pub fn remove(&mut self, name: &str) -> Option<T> {
    let index = self.find(name).ok()?;
    let next_is_empty =
      matches!(self.slots[self.next_index(index)], Slot::Empty);
    let replacement = if next_is_empty {
      Slot::Empty
    } else {
      self.tombstones += 1;
      Slot::Tombstone
    };
    let value = match std::mem::replace(&mut self.slots[index], replacement) {
      Slot::Occupied(_, value) => value,
      _ => unreachable!("find only matches occupied slots"),
    };
    self.used -= 1;
    if next_is_empty {
      self.collapse_tombstones_before(index);
    }
    Some(value)
  }

  /// Tombstones directly followed by an empty slot are no longer needed by
  /// any probe chain.
  fn collapse_tombstones_before(&mut self, empty_index: usize) {
    let mut index = self.prev_index(empty_index);
    while index != empty_index && matches!(self.slots[index], Slot::Tombstone)
    {
      self.slots[index] = Slot::Empty;
      self.tombstones -= 1;
      index = self.prev_index(index);
    }
  }

  /// Empties every slot without shrinking.
  pub fn clear(&mut self) {
    for slot in &mut self.slots {
      *slot = Slot::Empty;
    }
    self.used = 0;
    self.tombstones = 0;
  }

  /// Rebuilds the table once half the slots are in use. Tombstones count
  /// toward the load so a probe always finds an empty slot. The size only
  /// doubles when live entries alone reach half the slots.
  fn grow_if_needed(&mut self) {
    let size = self.size();
    if size > 2 * (self.used + self.tombstones) {
      return;
    }
    let new_size = if size <= 2 * self.used { size * 2 } else { size };
    self.rehash(new_size);
  }

  fn rehash(&mut self, new_size: usize) {
    tracing::trace!(
      from = self.size(),
      to = new_size,
      used = self.used,
      "rehashing symbol table"
    );
    let old = std::mem::replace(
      &mut self.slots,
      (0..new_size).map(|_| Slot::Empty).collect(),
    );
    self.tombstones = 0;
    for slot in old {
      if let Slot::Occupied(name, value) = slot {
        let mut index = hash(&name, new_size);
        while !matches!(self.slots[index], Slot::Empty) {
          index = self.next_index(index);
        }
        self.slots[index] = Slot::Occupied(name, value);
      }
    }
  }

  /// Live entries in slot order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
    self.slots.iter().filter_map(|slot| match slot {
      Slot::Occupied(name, value) => Some((name.as_str(), value)),
      _ => None,
    })
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut T)> {
    self.slots.iter_mut().filter_map(|slot| match slot {
      Slot::Occupied(name, value) => Some((name.as_str(), value)),
      _ => None,
    })
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.iter().map(|(name, _)| name)
  }

  /// Names starting with `prefix`, in slot order.
  pub fn names_with_prefix<'a>(
    &'a self,
    prefix: &'a str,
  ) -> impl Iterator<Item = &'a str> + 'a {
    self.names().filter(move |name| name.starts_with(prefix))
  }
}
