use domain::Order;

use crate::Cursor;

/// Request for one page of the order listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindAllPage {
    /// How many index entries to examine.
    pub size: usize,

    /// Where to resume; `Cursor::START` begins the listing.
    pub offset: Cursor,
}

impl FindAllPage {
    /// Creates a page request resuming at `offset`.
    pub fn new(size: usize, offset: Cursor) -> Self {
        Self { size, offset }
    }

    /// Creates a page request for the start of the listing.
    pub fn first(size: usize) -> Self {
        Self::new(size, Cursor::START)
    }
}

/// One page of the order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindResult {
    /// Orders in the order their keys were scanned.
    pub orders: Vec<Order>,

    /// Cursor for the next page; `Cursor::START` once the listing is done.
    pub cursor: Cursor,
}

impl FindResult {
    /// Returns true when no further page follows.
    pub fn is_last(&self) -> bool {
        self.cursor.is_start()
    }
}
