pub mod aggregate;
pub mod day;
pub mod directory;
pub mod page;
pub mod project;
pub mod record;

pub use aggregate::{AggregateSnapshot, FoldPolicy};
pub use day::{DayKey, DayZone};
pub use directory::{CurrentUser, OwnerDirectory};
pub use page::{Cursor, NextCursor, Page, PageBody};
pub use project::{
    DateSelection, Filter, FilteredRow, OwnerOption, daily_series, owner_options, project,
};
pub use record::{OwnerId, Record};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
