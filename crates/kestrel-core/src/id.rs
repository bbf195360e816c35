use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    num::NonZeroU64,
};

/// Monotonically assigned non-zero handle into a typed store. Zero is the
/// serialized representation of "none".
pub struct Id<T> {
    value: NonZeroU64,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(|value| Self {
            value,
            marker: PhantomData,
        })
    }

    pub fn value(self) -> u64 { self.value.get() }

    /// Serialized form: zero when absent.
    pub fn to_u64(id: Option<Self>) -> u64 { id.map_or(0, Self::value) }

    pub fn from_u64(value: u64) -> Option<Self> { Self::new(value) }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.value) }
}

impl<T> Copy for Id<T> {}
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool { self.value == other.value }
}
impl<T> Eq for Id<T> {}
impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}
impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.value.cmp(&other.value) }
}
impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) { self.value.hash(state) }
}

/// Allocates strictly increasing [Id]s, starting at 1.
pub struct IdAllocator<T> {
    next: u64,
    marker: PhantomData<fn() -> T>,
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        Self {
            next: 1,
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for IdAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdAllocator").field("next", &self.next).finish()
    }
}

impl<T> IdAllocator<T> {
    pub fn next(&mut self) -> Id<T> {
        let id = Id::new(self.next).expect("id space exhausted");
        self.next += 1;
        id
    }

    /// Bumps the allocator past an externally assigned id so it is never
    /// reissued.
    pub fn reserve(&mut self, id: Id<T>) {
        self.next = self.next.max(id.value() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag;

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut alloc = IdAllocator::<Tag>::default();
        let a = alloc.next();
        let b = alloc.next();
        assert!(a < b);
        assert_ne!(a, b);
        assert_eq!(a.value(), 1);
    }

    #[test]
    fn reserve_skips_taken_ids() {
        let mut alloc = IdAllocator::<Tag>::default();
        alloc.reserve(Id::new(41).unwrap());
        assert_eq!(alloc.next().value(), 42);
    }

    #[test]
    fn zero_round_trips_as_none() {
        assert_eq!(Id::<Tag>::from_u64(0), None);
        assert_eq!(Id::<Tag>::to_u64(None), 0);
        let id = Id::<Tag>::new(7);
        assert_eq!(Id::to_u64(id), 7);
    }
}
