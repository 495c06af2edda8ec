mod asset_type;
mod details;
mod source;

pub use self::asset_type::AssetType;
pub use self::details::FormatDetails;
pub use self::source::{Imported, SourceFile};
