pub mod fields;
pub mod raw;
pub mod records;

pub use fields::{FuzzyDate, ImageChoice, Tag, Title};
pub use raw::{Entry, Media, MediaList, RawPayload, User};
pub use records::{DimensionMedia, DimensionUser, FactAnime, FromEntry};
