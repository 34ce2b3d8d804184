//! Replayable, cached query results.

use std::iter::Fuse;
use tessera_common::utils::error::{Error, Result};

/// A lazily consumed sequence that remembers what it has produced.
///
/// Items are pulled from the underlying iterator only when needed and kept,
/// so repeated iteration, `contains` and positional access never pull the
/// same item twice.
pub struct QueryResult<I: Iterator> {
    source: Fuse<I>,
    cache: Vec<I::Item>,
    exhausted: bool,
}

impl<I: Iterator> QueryResult<I> {
    /// Wraps an iterator.
    pub fn new(source: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            source: source.into_iter().fuse(),
            cache: Vec::new(),
            exhausted: false,
        }
    }

    /// Pulls until at least `n` items are cached or the source runs dry.
    fn fill(&mut self, n: usize) {
        while !self.exhausted && self.cache.len() < n {
            match self.source.next() {
                Some(item) => self.cache.push(item),
                None => self.exhausted = true,
            }
        }
    }

    /// Returns the first item.
    pub fn first(&mut self) -> Option<&I::Item> {
        self.get(0)
    }

    /// Returns the item at `index`.
    pub fn get(&mut self, index: usize) -> Option<&I::Item> {
        self.fill(index.saturating_add(1));
        self.cache.get(index)
    }

    /// Drains the source and returns every item.
    pub fn all(&mut self) -> &[I::Item] {
        self.fill(usize::MAX);
        &self.cache
    }

    /// Returns the only item.
    ///
    /// Looks one item past the first before answering.
    ///
    /// # Errors
    ///
    /// Returns `MultipleResults` if there is more than one item, and
    /// `EmptyResult` if there is none and `strict` is set.
    pub fn one(&mut self, strict: bool) -> Result<Option<&I::Item>> {
        self.fill(2);
        match self.cache.len() {
            0 if strict => Err(Error::EmptyResult),
            0 => Ok(None),
            1 => Ok(self.cache.first()),
            _ => Err(Error::MultipleResults),
        }
    }

    /// Returns true if some item equals `needle`, pulling only as far as needed.
    pub fn contains(&mut self, needle: &I::Item) -> bool
    where
        I::Item: PartialEq,
    {
        if self.cache.contains(needle) {
            return true;
        }
        while !self.exhausted {
            let before = self.cache.len();
            self.fill(before + 1);
            if self.cache.get(before).is_some_and(|item| item == needle) {
                return true;
            }
        }
        false
    }

    /// Returns the items pulled so far.
    #[must_use]
    pub fn cached(&self) -> &[I::Item] {
        &self.cache
    }

    /// Drains the source and iterates over every item.
    pub fn iter(&mut self) -> std::slice::Iter<'_, I::Item> {
        self.all().iter()
    }
}

impl<I: Iterator> IntoIterator for QueryResult<I> {
    type Item = I::Item;
    type IntoIter = std::iter::Chain<std::vec::IntoIter<I::Item>, Fuse<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cache.into_iter().chain(self.source)
    }
}

impl<I: Iterator> std::fmt::Debug for QueryResult<I>
where
    I::Item: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("cache", &self.cache)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counts how often the source is pulled.
    fn counted(n: u32, pulls: &Cell<u32>) -> impl Iterator<Item = u32> + '_ {
        (0..n).inspect(move |_| pulls.set(pulls.get() + 1))
    }

    #[test]
    fn test_one_empty() {
        let mut r = QueryResult::new(std::iter::empty::<u32>());
        assert!(matches!(r.one(true), Err(Error::EmptyResult)));
        assert_eq!(r.one(false).unwrap(), None);
    }

    #[test]
    fn test_one_single() {
        let mut r = QueryResult::new(vec![7]);
        assert_eq!(r.one(true).unwrap(), Some(&7));
    }

    #[test]
    fn test_one_multiple_caches_two() {
        let pulls = Cell::new(0);
        let mut r = QueryResult::new(counted(10, &pulls));
        assert!(matches!(r.one(true), Err(Error::MultipleResults)));
        assert_eq!(r.cached(), &[0, 1]);
        assert!(matches!(r.one(true), Err(Error::MultipleResults)));
        assert_eq!(r.cached(), &[0, 1]);
        assert_eq!(pulls.get(), 2);
    }

    #[test]
    fn test_replay_does_not_pull_again() {
        let pulls = Cell::new(0);
        let mut r = QueryResult::new(counted(3, &pulls));
        assert_eq!(r.first(), Some(&0));
        assert_eq!(pulls.get(), 1);
        assert_eq!(r.all(), &[0, 1, 2]);
        assert_eq!(r.all(), &[0, 1, 2]);
        assert!(r.contains(&2));
        assert_eq!(r.get(1), Some(&1));
        assert_eq!(r.iter().count(), 3);
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn test_contains_stops_early() {
        let pulls = Cell::new(0);
        let mut r = QueryResult::new(counted(100, &pulls));
        assert!(r.contains(&4));
        assert_eq!(pulls.get(), 5);
        assert!(!r.contains(&1000));
        assert_eq!(r.cached().len(), 100);
        assert!(!r.contains(&1000));
        assert_eq!(pulls.get(), 100);
    }

    #[test]
    fn test_into_iter_yields_cached_then_rest() {
        let mut r = QueryResult::new(vec![1, 2, 3]);
        r.first();
        assert_eq!(r.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
