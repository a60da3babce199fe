mod blacklist;
mod entry;

pub use self::blacklist::BlacklistEntry;
pub(crate) use self::blacklist::BlacklistRow;
pub use self::entry::CacheEntry;
pub(crate) use self::entry::EntryRow;
