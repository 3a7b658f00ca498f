use std::mem;

/// Values opened since the last MAC check, with this party's MAC shares.
#[derive(Clone, Debug, Default)]
pub struct OpenedValueStore<T> {
    values: Vec<T>,
    macs: Vec<T>,
}

impl<T> OpenedValueStore<T> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            macs: Vec::new(),
        }
    }

    /// Record an opened value and this party's share of its MAC.
    pub fn push(&mut self, value: T, mac_share: T) {
        self.values.push(value);
        self.macs.push(mac_share);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove all pending values. Returns values and MAC shares in opening order.
    pub fn take_pending(&mut self) -> (Vec<T>, Vec<T>) {
        (mem::take(&mut self.values), mem::take(&mut self.macs))
    }
}
