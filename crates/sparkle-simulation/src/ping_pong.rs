//! Two-element ping-pong pair with a live index

/// A pair of identically shaped resources, one of which is "live" (holds the newest generation)
/// while the other is the "prior" one the next pass reads from or writes into.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    items: [T; 2],
    live: usize,
}

impl<T> PingPong<T> {
    /// `first` starts out live.
    pub fn new(first: T, second: T) -> Self {
        Self {
            items: [first, second],
            live: 0,
        }
    }

    pub fn live_index(&self) -> usize {
        self.live
    }

    pub fn prior_index(&self) -> usize {
        1 - self.live
    }

    pub fn live(&self) -> &T {
        &self.items[self.live]
    }

    pub fn prior(&self) -> &T {
        &self.items[1 - self.live]
    }

    pub fn items(&self) -> &[T; 2] {
        &self.items
    }

    /// Swap roles. Called exactly once per completed physics dispatch.
    pub fn flip(&mut self) {
        self.live = 1 - self.live;
    }

    /// Build the matching pair for both orientations: element `i` is `f(items[i], items[1 - i])`.
    pub fn orientations<U>(&self, mut f: impl FnMut(&T, &T) -> U) -> [U; 2] {
        [
            f(&self.items[0], &self.items[1]),
            f(&self.items[1], &self.items[0]),
        ]
    }
}
