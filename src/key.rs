use std::fmt::Debug;
use std::hash::Hash;

/// Identifier used to request values from a [`Loader`](crate::Loader).
///
/// Keys are compared by value. A key that fails [`Key::is_valid`] is rejected by the loader
/// before it can enter a batch.
pub trait Key: 'static + Clone + Eq + Hash + Ord + Debug + Send + Sync {
    fn is_valid(&self) -> bool {
        true
    }
}

impl Key for String {
    fn is_valid(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Key for &'static str {
    fn is_valid(&self) -> bool {
        !self.trim().is_empty()
    }
}

macro_rules! impl_key_for_ints {
    ($($t:ty),*) => {
        $(impl Key for $t {})*
    };
}

impl_key_for_ints!(i32, i64, u32, u64, usize);

impl Key for uuid::Uuid {
    fn is_valid(&self) -> bool {
        !self.is_nil()
    }
}
