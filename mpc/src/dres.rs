use std::{cell::OnceCell, fmt, rc::Rc};

use crate::error::MpcError;

/// Deferred result of a protocol.
///
/// Written exactly once by the producing protocol, readable any number of times afterwards.
/// Handles are cheap to clone and all clones observe the same value.
pub struct DRes<T>(Rc<OnceCell<T>>);

impl<T> DRes<T> {
    /// Result that will be produced later.
    pub fn pending() -> Self {
        Self(Rc::new(OnceCell::new()))
    }

    /// Result that is already known.
    pub fn ready(value: T) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(value);
        Self(Rc::new(cell))
    }

    /// Has the producer already written the value?
    pub fn is_ready(&self) -> bool {
        self.0.get().is_some()
    }

    /// Borrow the value.
    pub fn get(&self) -> Result<&T, MpcError> {
        self.0
            .get()
            .ok_or_else(|| MpcError::contract("deferred result read before it was produced"))
    }

    /// Write the value. Only the producing protocol may call this, and only once.
    pub fn set(&self, value: T) -> Result<(), MpcError> {
        self.0
            .set(value)
            .map_err(|_| MpcError::contract("deferred result written twice"))
    }
}

impl<T: Clone> DRes<T> {
    /// Copy of the value.
    pub fn out(&self) -> Result<T, MpcError> {
        self.get().cloned()
    }
}

impl<T> Clone for DRes<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for DRes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(value) => f.debug_tuple("DRes").field(value).finish(),
            None => f.write_str("DRes(<pending>)"),
        }
    }
}

/// Read all values of a list of deferred results.
pub fn out_all<T: Clone>(list: &[DRes<T>]) -> Result<Vec<T>, MpcError> {
    list.iter().map(DRes::out).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_once() {
        let x = DRes::pending();
        let y = x.clone();
        assert!(!y.is_ready());
        assert!(matches!(y.out(), Err(MpcError::ProgrammingContract(_))));

        x.set(5u32).unwrap();
        assert_eq!(y.out().unwrap(), 5);
        assert!(matches!(y.set(6), Err(MpcError::ProgrammingContract(_))));
        assert_eq!(x.out().unwrap(), 5);
    }

    #[test]
    fn test_out_all() {
        let list = vec![DRes::ready(1), DRes::ready(2)];
        assert_eq!(out_all(&list).unwrap(), vec![1, 2]);
        let list = vec![DRes::ready(1), DRes::pending()];
        assert!(out_all(&list).is_err());
    }
}
