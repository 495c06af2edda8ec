mod asset;
mod options;
mod query;

pub use self::asset::{ImportedAsset, NewAsset, Registration};
pub use self::options::{ImportDefaults, ImportOptions, TypeDefaults};
pub use self::query::QueryFilter;
