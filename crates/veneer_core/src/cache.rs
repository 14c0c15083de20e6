//! Previous-value + comparator memo cells
//!
//! Every observer and the overflow calculator needs to answer the same
//! question: "did this quantity actually change since last time?". A [`Cache`]
//! holds the current and previous value of one tracked quantity and reports a
//! change exactly when the comparator says the new value differs.
//!
//! Cells are never shared across unrelated quantities; each tracked quantity
//! (scrollbar size, overflow amount, fractional size, ...) owns its own cell
//! and mutates it only through [`Cache::update`] / [`Cache::update_with`].

/// Result of a cache update or read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Updated<T> {
    /// The value stored after the operation.
    pub value: T,
    /// Whether the operation replaced the stored value.
    pub changed: bool,
    /// The value that was current before the last change, if any.
    pub previous: Option<T>,
}

/// A memo cell for one tracked quantity.
///
/// Comparison defaults to `PartialEq`; compound types (width/height pairs,
/// TRBL boxes) derive field-wise equality so identity never leaks in. A
/// custom comparator can be supplied for fuzzy comparisons.
#[derive(Clone)]
pub struct Cache<T> {
    current: T,
    previous: Option<T>,
    equal: Option<fn(&T, &T) -> bool>,
    always: bool,
}

impl<T: Clone + PartialEq> Cache<T> {
    /// Create a cell seeded with `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            current: initial,
            previous: None,
            equal: None,
            always: false,
        }
    }

    /// Use a custom comparator instead of `PartialEq`.
    pub fn with_equal(mut self, equal: fn(&T, &T) -> bool) -> Self {
        self.equal = Some(equal);
        self
    }

    /// Report every update as changed regardless of comparison.
    pub fn always_changed(mut self) -> Self {
        self.always = true;
        self
    }

    fn eq(&self, a: &T, b: &T) -> bool {
        match self.equal {
            Some(equal) => equal(a, b),
            None => a == b,
        }
    }

    /// Compare `new` against the stored value and store it on change.
    ///
    /// Isolated mode: the caller supplies a freshly computed value.
    pub fn update(&mut self, new: T) -> Updated<T> {
        self.apply(new, false)
    }

    /// Like [`Cache::update`] but `force` marks the update as changed even
    /// when the comparator reports equality.
    pub fn update_forced(&mut self, new: T, force: bool) -> Updated<T> {
        self.apply(new, force)
    }

    /// Contextual mode: the callback receives `(current, previous)` and
    /// returns the value to compare, so the computation itself may depend on
    /// cache history ("did scroll size change relative to last observed").
    pub fn update_with(&mut self, compute: impl FnOnce(&T, Option<&T>) -> T) -> Updated<T> {
        let new = compute(&self.current, self.previous.as_ref());
        self.apply(new, false)
    }

    /// Read the current state without comparing; `changed` is always false.
    pub fn read(&self) -> Updated<T> {
        Updated {
            value: self.current.clone(),
            changed: false,
            previous: self.previous.clone(),
        }
    }

    /// The current value.
    pub fn current(&self) -> &T {
        &self.current
    }

    fn apply(&mut self, new: T, force: bool) -> Updated<T> {
        let changed = self.always || force || !self.eq(&new, &self.current);
        if changed {
            self.previous = Some(std::mem::replace(&mut self.current, new));
        }
        Updated {
            value: self.current.clone(),
            changed,
            previous: self.previous.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Wh;

    #[test]
    fn identical_value_is_not_a_change() {
        let mut cell = Cache::new(3);
        assert!(cell.update(4).changed);
        assert!(!cell.update(4).changed);
        assert!(!cell.update(4).changed);
    }

    #[test]
    fn always_flag_reports_change_on_first_update() {
        let mut cell = Cache::new(7).always_changed();
        let first = cell.update(7);
        assert!(first.changed);
        assert!(cell.update(7).changed);
    }

    #[test]
    fn previous_value_shifts_on_change() {
        let mut cell = Cache::new(1);
        let up = cell.update(2);
        assert_eq!(up.previous, Some(1));
        let up = cell.update(5);
        assert_eq!(up.previous, Some(2));
        assert_eq!(cell.read().previous, Some(2));
    }

    #[test]
    fn forced_update_marks_change_for_equal_values() {
        let mut cell = Cache::new(9);
        assert!(cell.update_forced(9, true).changed);
    }

    #[test]
    fn contextual_update_sees_history() {
        let mut cell = Cache::new(10);
        cell.update(20);
        let up = cell.update_with(|current, previous| current + previous.unwrap_or(&0));
        assert!(up.changed);
        assert_eq!(up.value, 30);
    }

    #[test]
    fn compound_values_compare_field_wise() {
        let mut cell = Cache::new(Wh::new(100.0_f32, 50.0));
        assert!(!cell.update(Wh::new(100.0, 50.0)).changed);
        assert!(cell.update(Wh::new(100.0, 51.0)).changed);
    }

    #[test]
    fn read_never_reports_change() {
        let mut cell = Cache::new(0);
        cell.update(1);
        assert!(!cell.read().changed);
        assert_eq!(cell.read().value, 1);
    }
}
